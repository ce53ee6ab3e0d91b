// File: gsettings.rs
// Location: /src/gsettings.rs

use gio::prelude::*;
use std::path::{Path, PathBuf};

pub const BACKGROUND_SCHEMA: &str = "org.gnome.desktop.background";
pub const INTERFACE_SCHEMA: &str = "org.gnome.desktop.interface";
pub const PANEL_SCHEMA: &str = "com.plenjos.shell.panel";

pub const PICTURE_URI_KEY: &str = "picture-uri";
pub const PICTURE_URI_DARK_KEY: &str = "picture-uri-dark";
pub const COLOR_SCHEME_KEY: &str = "color-scheme";

/// Returns `None` instead of aborting when the schema is not installed.
pub fn settings_if_available(schema: &str) -> Option<gio::Settings> {
    let source = gio::SettingsSchemaSource::default()?;
    if source.lookup(schema, true).is_none() {
        log::warn!("GSettings schema {} is not installed", schema);
        return None;
    }
    Some(gio::Settings::new(schema))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorScheme {
    #[default]
    Default,
    PreferLight,
    PreferDark,
}

impl ColorScheme {
    pub const LABELS: [&'static str; 3] = ["Default", "Light", "Dark"];

    pub fn as_str(self) -> &'static str {
        match self {
            ColorScheme::Default => "default",
            ColorScheme::PreferLight => "prefer-light",
            ColorScheme::PreferDark => "prefer-dark",
        }
    }

    /// Unknown values map to `Default`.
    pub fn parse(value: &str) -> Self {
        match value {
            "prefer-light" => ColorScheme::PreferLight,
            "prefer-dark" => ColorScheme::PreferDark,
            _ => ColorScheme::Default,
        }
    }

    pub fn from_index(index: u32) -> Self {
        match index {
            1 => ColorScheme::PreferLight,
            2 => ColorScheme::PreferDark,
            _ => ColorScheme::Default,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            ColorScheme::Default => 0,
            ColorScheme::PreferLight => 1,
            ColorScheme::PreferDark => 2,
        }
    }

    pub fn read(settings: &gio::Settings) -> Self {
        Self::parse(&settings.string(COLOR_SCHEME_KEY))
    }

    pub fn write(self, settings: &gio::Settings) -> anyhow::Result<()> {
        settings.set_string(COLOR_SCHEME_KEY, self.as_str())?;
        Ok(())
    }
}

pub fn background_key_for(scheme: ColorScheme) -> &'static str {
    match scheme {
        ColorScheme::PreferDark => PICTURE_URI_DARK_KEY,
        _ => PICTURE_URI_KEY,
    }
}

/// Local path of a background URI, or `None` for empty and non-local URIs.
pub fn picture_path_from_uri(uri: &str) -> Option<PathBuf> {
    let uri = uri.trim();
    if uri.is_empty() {
        return None;
    }

    if uri.starts_with('/') {
        return Some(PathBuf::from(uri));
    }

    gio::File::for_uri(uri).path()
}

pub fn file_uri_for_path(path: &Path) -> String {
    gio::File::for_path(path).uri().to_string()
}

/// Writes the same picture to the light and dark background keys.
pub fn set_background(settings: &gio::Settings, uri: &str) -> anyhow::Result<()> {
    settings.set_string(PICTURE_URI_KEY, uri)?;
    settings.set_string(PICTURE_URI_DARK_KEY, uri)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_scheme_index_mapping() {
        assert_eq!(ColorScheme::from_index(0), ColorScheme::Default);
        assert_eq!(ColorScheme::from_index(1), ColorScheme::PreferLight);
        assert_eq!(ColorScheme::from_index(2), ColorScheme::PreferDark);
        assert_eq!(ColorScheme::from_index(7), ColorScheme::Default);
        // GTK_INVALID_LIST_POSITION
        assert_eq!(ColorScheme::from_index(u32::MAX), ColorScheme::Default);

        for scheme in [ColorScheme::Default, ColorScheme::PreferLight, ColorScheme::PreferDark] {
            assert_eq!(ColorScheme::from_index(scheme.index()), scheme);
            assert!((scheme.index() as usize) < ColorScheme::LABELS.len());
        }
    }

    #[test]
    fn test_color_scheme_strings() {
        assert_eq!(ColorScheme::parse("prefer-dark"), ColorScheme::PreferDark);
        assert_eq!(ColorScheme::parse("prefer-light"), ColorScheme::PreferLight);
        assert_eq!(ColorScheme::parse("default"), ColorScheme::Default);
        assert_eq!(ColorScheme::parse("solarized"), ColorScheme::Default);
        assert_eq!(ColorScheme::PreferDark.as_str(), "prefer-dark");
    }

    #[test]
    fn test_background_key_follows_scheme() {
        assert_eq!(background_key_for(ColorScheme::PreferDark), "picture-uri-dark");
        assert_eq!(background_key_for(ColorScheme::PreferLight), "picture-uri");
        assert_eq!(background_key_for(ColorScheme::Default), "picture-uri");
    }

    #[test]
    fn test_picture_path_from_uri() {
        assert_eq!(
            picture_path_from_uri("file:///usr/share/backgrounds/My%20Picture.jpg"),
            Some(PathBuf::from("/usr/share/backgrounds/My Picture.jpg"))
        );
        assert_eq!(
            picture_path_from_uri("/home/user/wall.png"),
            Some(PathBuf::from("/home/user/wall.png"))
        );
        assert_eq!(picture_path_from_uri(""), None);
        assert_eq!(picture_path_from_uri("   "), None);
    }

    #[test]
    fn test_file_uri_round_trips_spaces() {
        let uri = file_uri_for_path(Path::new("/tmp/a b.png"));
        assert_eq!(uri, "file:///tmp/a%20b.png");
        assert_eq!(picture_path_from_uri(&uri), Some(PathBuf::from("/tmp/a b.png")));
    }
}
