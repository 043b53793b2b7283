//! `reply_markup` JSON for the two keyboard shapes.

use domains::models::Keyboard;
use serde_json::{json, Value};

pub(crate) fn reply_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Reply(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| row.iter().map(|label| json!({ "text": label })).collect())
                .collect();
            json!({ "keyboard": rows, "resize_keyboard": true })
        }
        Keyboard::Inline(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| {
                            json!({
                                "text": button.label,
                                "callback_data": button.action.encode(),
                            })
                        })
                        .collect()
                })
                .collect();
            json!({ "inline_keyboard": rows })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::models::{Action, InlineButton};

    #[test]
    fn inline_buttons_carry_encoded_actions() {
        let keyboard = Keyboard::Inline(vec![vec![InlineButton::new(
            "Отмена",
            Action::BroadcastCancel,
        )]]);
        assert_eq!(
            reply_markup(&keyboard),
            json!({ "inline_keyboard": [[{ "text": "Отмена", "callback_data": "bc:no" }]] })
        );
    }

    #[test]
    fn reply_keyboard_is_resized() {
        let keyboard = Keyboard::Reply(vec![vec!["Мои обращения".to_string()]]);
        let markup = reply_markup(&keyboard);
        assert_eq!(markup["resize_keyboard"], json!(true));
        assert_eq!(markup["keyboard"][0][0]["text"], json!("Мои обращения"));
    }
}
