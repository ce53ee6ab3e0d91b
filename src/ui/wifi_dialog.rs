// File: wifi_dialog.rs
// Location: /src/ui/wifi_dialog.rs

use gtk4::prelude::*;
use libadwaita::{self as adw, prelude::*};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::oneshot;

use plenjos_settings::wifi::{Credentials, Security};

/// Asks for the secrets `security` needs. `None` means the user cancelled.
pub async fn request_credentials(
    parent: &impl IsA<gtk4::Widget>,
    ssid: &str,
    security: Security,
) -> Option<Credentials> {
    let dialog = adw::Dialog::builder()
        .title(format!("Connect to {}", ssid))
        .content_width(420)
        .build();

    let content_box = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
    content_box.set_margin_top(12);
    content_box.set_margin_bottom(12);
    content_box.set_margin_start(12);
    content_box.set_margin_end(12);

    let enterprise = security == Security::Enterprise;

    let subtitle = gtk4::Label::new(Some(if enterprise {
        "This network requires a username and password"
    } else {
        "Enter the network password"
    }));
    subtitle.set_xalign(0.0);
    subtitle.set_opacity(0.7);
    subtitle.set_wrap(true);
    content_box.append(&subtitle);

    let fields = gtk4::ListBox::builder()
        .css_classes(vec!["boxed-list".to_string()])
        .selection_mode(gtk4::SelectionMode::None)
        .build();

    let identity_entry = adw::EntryRow::builder()
        .title("Username")
        .visible(enterprise)
        .build();
    fields.append(&identity_entry);

    let password_entry = adw::PasswordEntryRow::builder()
        .title(if security == Security::Wep { "Key" } else { "Password" })
        .build();
    fields.append(&password_entry);
    content_box.append(&fields);

    let buttons = gtk4::Box::new(gtk4::Orientation::Horizontal, 12);
    buttons.set_halign(gtk4::Align::End);
    buttons.set_margin_top(12);

    let cancel_btn = gtk4::Button::builder()
        .label("Cancel")
        .css_classes(vec!["flat".to_string()])
        .build();

    let connect_btn = gtk4::Button::builder()
        .label("Connect")
        .css_classes(vec!["suggested-action".to_string()])
        .sensitive(false)
        .build();

    let (tx, rx) = oneshot::channel::<Option<Credentials>>();
    let tx_cell = Rc::new(RefCell::new(Some(tx)));

    let update_sensitivity = {
        let connect_btn = connect_btn.clone();
        let identity_entry = identity_entry.clone();
        let password_entry = password_entry.clone();
        move || {
            let identity_ok = !enterprise || !identity_entry.text().is_empty();
            connect_btn.set_sensitive(identity_ok && security.accepts_secret(&password_entry.text()));
        }
    };
    let update = update_sensitivity.clone();
    identity_entry.connect_changed(move |_| update());
    let update = update_sensitivity.clone();
    password_entry.connect_changed(move |_| update());

    let dialog_close = dialog.clone();
    let tx_cancel = tx_cell.clone();
    cancel_btn.connect_clicked(move |_| {
        if let Some(tx) = tx_cancel.borrow_mut().take() {
            let _ = tx.send(None);
        }
        dialog_close.close();
    });

    let dialog_close = dialog.clone();
    let tx_connect = tx_cell.clone();
    let identity_for_connect = identity_entry.clone();
    let password_for_connect = password_entry.clone();
    connect_btn.connect_clicked(move |_| {
        let password = password_for_connect.text().to_string();
        if !security.accepts_secret(&password) {
            return;
        }

        let credentials = match security {
            Security::Enterprise => {
                let identity = identity_for_connect.text().to_string();
                if identity.is_empty() {
                    return;
                }
                Credentials::Enterprise { identity, password }
            }
            Security::Wep => Credentials::Wep(password),
            _ => Credentials::Psk(password),
        };

        if let Some(tx) = tx_connect.borrow_mut().take() {
            let _ = tx.send(Some(credentials));
        }
        dialog_close.close();
    });

    let connect_trigger = connect_btn.clone();
    password_entry.connect_entry_activated(move |_| {
        if connect_trigger.is_sensitive() {
            connect_trigger.emit_clicked();
        }
    });

    // Escape or the close button count as cancel.
    let tx_closed = tx_cell.clone();
    dialog.connect_closed(move |_| {
        if let Some(tx) = tx_closed.borrow_mut().take() {
            let _ = tx.send(None);
        }
    });

    buttons.append(&cancel_btn);
    buttons.append(&connect_btn);
    content_box.append(&buttons);

    dialog.set_default_widget(Some(&connect_btn));
    dialog.set_child(Some(&content_box));
    if let Some(parent) = parent.root().and_downcast_ref::<gtk4::Window>() {
        dialog.present(Some(parent));
    } else {
        dialog.present(None::<&gtk4::Window>);
    }

    if enterprise {
        identity_entry.grab_focus();
    } else {
        password_entry.grab_focus();
    }

    rx.await.ok().flatten()
}
