//! Pure rendering helpers: captions, keyboards and per-issue message units.

use domains::catalog::{CATEGORIES, DISTRICTS};
use domains::models::{
    Action, Attachment, AttachmentKind, Comment, FilterDimension, InlineButton, Issue,
    IssueFilter, IssueStatus, Keyboard, ListView, MediaSource, OutboundMessage,
};

use crate::texts;

/// Body text cap inside list captions, in characters.
pub const BODY_PREVIEW_CHARS: usize = 200;

pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn body_preview(issue: &Issue) -> String {
    match issue.text.as_deref().filter(|t| !t.is_empty()) {
        Some(text) => truncate(text, BODY_PREVIEW_CHARS),
        None => texts::NO_TEXT.to_string(),
    }
}

fn classification_lines(issue: &Issue) -> String {
    let mut extra = String::new();
    if let Some(district) = issue.district.as_deref().filter(|d| !d.is_empty()) {
        extra.push_str("\nРайон: ");
        extra.push_str(district);
    }
    if let Some(category) = issue.category.as_deref().filter(|c| !c.is_empty()) {
        extra.push_str("\nКатегория: ");
        extra.push_str(category);
    }
    extra
}

/// Caption of an issue in the requester's own list.
pub fn own_caption(issue: &Issue, latest_comment: Option<&Comment>) -> String {
    let mut caption = format!(
        "#{} — {}{}\n{}",
        issue.id,
        issue.status,
        classification_lines(issue),
        body_preview(issue)
    );
    if let Some(comment) = latest_comment.filter(|c| !c.text.is_empty()) {
        caption.push_str("\n\nКомментарий администрации:\n");
        caption.push_str(&comment.text);
    }
    caption
}

/// Caption of an issue in the moderation list; includes coordinates.
pub fn admin_caption(issue: &Issue, latest_comment: Option<&Comment>) -> String {
    let mut extra = classification_lines(issue);
    if let Some(point) = issue.location {
        extra.push_str(&format!(
            "\nКоординаты: {:.6}, {:.6}",
            point.latitude, point.longitude
        ));
    }
    let mut caption = format!(
        "Заявка #{}\nСтатус: {}{}\n{}",
        issue.id,
        issue.status,
        extra,
        body_preview(issue)
    );
    if let Some(comment) = latest_comment.filter(|c| !c.text.is_empty()) {
        caption.push_str("\n\nКомментарий администратора:\n");
        caption.push_str(&comment.text);
    }
    caption
}

pub fn admin_header(page: u32, filter: &IssueFilter) -> String {
    let mut header = format!("Заявки (страница {page})");
    if filter.is_empty() {
        return header;
    }
    header.push_str("\nФильтр:");
    if let Some(district) = &filter.district {
        header.push_str(" район — ");
        header.push_str(district);
    }
    if let Some(category) = &filter.category {
        if filter.district.is_some() {
            header.push(',');
        }
        header.push_str(" категория — ");
        header.push_str(category);
    }
    header
}

/// Status transitions plus the comment entry for one issue.
pub fn admin_controls(issue_id: i64) -> Keyboard {
    let statuses = IssueStatus::TRANSITIONS
        .into_iter()
        .map(|status| {
            InlineButton::new(
                status.label(),
                Action::ChangeStatus { issue_id, status },
            )
        })
        .collect();
    Keyboard::Inline(vec![
        statuses,
        vec![InlineButton::new(
            texts::COMMENT_BUTTON,
            Action::AddComment { issue_id },
        )],
    ])
}

/// Inline neighbours of an admin page; there is no "previous" on page one.
pub fn admin_page_turner(page: u32) -> Keyboard {
    let turn = |page| Action::Page {
        view: ListView::Admin,
        page,
    };
    let mut row = Vec::new();
    if page > 1 {
        row.push(InlineButton::new(texts::MENU_PREVIOUS, turn(page - 1)));
    }
    row.push(InlineButton::new(texts::MENU_NEXT, turn(page.saturating_add(1))));
    Keyboard::Inline(vec![row])
}

fn reply_rows<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<Vec<String>> {
    labels.into_iter().map(|l| vec![l.to_string()]).collect()
}

pub fn district_keyboard() -> Keyboard {
    Keyboard::Reply(reply_rows(DISTRICTS.iter().copied()))
}

pub fn category_keyboard() -> Keyboard {
    Keyboard::Reply(reply_rows(CATEGORIES.iter().copied()))
}

fn paging_row() -> Vec<String> {
    vec![
        texts::MENU_PREVIOUS.to_string(),
        texts::MENU_NEXT.to_string(),
    ]
}

pub fn user_paging_keyboard() -> Keyboard {
    Keyboard::Reply(vec![
        paging_row(),
        vec![texts::MENU_MY_ISSUES.to_string()],
        vec![texts::MENU_HELP.to_string()],
    ])
}

pub fn admin_paging_keyboard() -> Keyboard {
    Keyboard::Reply(vec![paging_row()])
}

fn filter_menu(dimension: FilterDimension, names: &[&str], all_label: &str) -> Keyboard {
    let mut rows: Vec<Vec<InlineButton>> = names
        .iter()
        .map(|name| {
            vec![InlineButton::new(
                *name,
                Action::SetFilter {
                    dimension,
                    value: Some(name.to_string()),
                },
            )]
        })
        .collect();
    rows.push(vec![InlineButton::new(
        all_label,
        Action::SetFilter {
            dimension,
            value: None,
        },
    )]);
    Keyboard::Inline(rows)
}

pub fn district_filter_menu() -> OutboundMessage {
    OutboundMessage::with_keyboard(
        texts::FILTER_DISTRICT_PROMPT,
        filter_menu(FilterDimension::District, DISTRICTS, texts::FILTER_ALL_DISTRICTS),
    )
}

pub fn category_filter_menu() -> OutboundMessage {
    OutboundMessage::with_keyboard(
        texts::FILTER_CATEGORY_PROMPT,
        filter_menu(FilterDimension::Category, CATEGORIES, texts::FILTER_ALL_CATEGORIES),
    )
}

pub fn broadcast_preview(text: &str) -> OutboundMessage {
    OutboundMessage::with_keyboard(
        texts::broadcast_preview(text),
        Keyboard::Inline(vec![vec![
            InlineButton::new(texts::BROADCAST_CONFIRM, Action::BroadcastConfirm),
            InlineButton::new(texts::BROADCAST_CANCEL, Action::BroadcastCancel),
        ]]),
    )
}

/// Splits off the first photo in stored order; everything else follows it.
pub fn split_main_photo(attachments: Vec<Attachment>) -> (Option<Attachment>, Vec<Attachment>) {
    let position = attachments
        .iter()
        .position(|a| a.kind == AttachmentKind::Photo);
    match position {
        Some(index) => {
            let mut rest = attachments;
            let main = rest.remove(index);
            (Some(main), rest)
        }
        None => (None, attachments),
    }
}

/// Messages for one issue: the captioned carrier first, then follow-ups.
pub fn issue_unit(
    caption: String,
    controls: Option<Keyboard>,
    attachments: Vec<Attachment>,
) -> Vec<OutboundMessage> {
    let (main, rest) = split_main_photo(attachments);
    let carrier = match main {
        Some(photo) => OutboundMessage::Photo {
            source: MediaSource::for_attachment(&photo),
            caption: Some(caption),
            keyboard: controls,
        },
        None => OutboundMessage::Text {
            text: caption,
            keyboard: controls,
        },
    };

    std::iter::once(carrier)
        .chain(rest.iter().map(OutboundMessage::attachment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::models::GeoPoint;

    fn issue(text: Option<&str>) -> Issue {
        Issue {
            id: 12,
            user_id: 1,
            chat_id: 100,
            text: text.map(str::to_string),
            location: None,
            status: IssueStatus::New,
            district: Some("Ленинский".into()),
            category: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn attachment(id: i64, kind: AttachmentKind) -> Attachment {
        Attachment {
            id,
            issue_id: 12,
            file_ref: format!("ref-{id}"),
            kind,
            locator: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let long = "ы".repeat(250);
        let cut = truncate(&long, 200);
        assert_eq!(cut.chars().count(), 201);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("short", 200), "short");
    }

    #[test]
    fn own_caption_layout() {
        let comment = Comment {
            id: 1,
            issue_id: 12,
            admin_user_id: 2,
            text: "Передано в службу".into(),
            created_at: Utc::now(),
        };
        assert_eq!(
            own_caption(&issue(Some("Яма")), Some(&comment)),
            "#12 — Новая\nРайон: Ленинский\nЯма\n\nКомментарий администрации:\nПередано в службу"
        );
        assert_eq!(own_caption(&issue(None), None), "#12 — Новая\nРайон: Ленинский\n(без текста)");
    }

    #[test]
    fn admin_caption_includes_coordinates() {
        let mut issue = issue(Some("Яма"));
        issue.location = Some(GeoPoint {
            latitude: 48.0159,
            longitude: 37.80285,
        });
        assert_eq!(
            admin_caption(&issue, None),
            "Заявка #12\nСтатус: Новая\nРайон: Ленинский\nКоординаты: 48.015900, 37.802850\nЯма"
        );
    }

    #[test]
    fn admin_header_describes_filter() {
        let filter = IssueFilter {
            district: Some("Ленинский".into()),
            category: Some("ЖКХ".into()),
        };
        assert_eq!(
            admin_header(2, &filter),
            "Заявки (страница 2)\nФильтр: район — Ленинский, категория — ЖКХ"
        );
        assert_eq!(admin_header(1, &IssueFilter::default()), "Заявки (страница 1)");
    }

    #[test]
    fn page_turner_has_no_previous_on_page_one() {
        let actions = |keyboard: Keyboard| match keyboard {
            Keyboard::Inline(rows) => rows
                .into_iter()
                .flatten()
                .map(|button| button.action)
                .collect::<Vec<_>>(),
            other => panic!("expected inline keyboard, got {other:?}"),
        };
        assert_eq!(
            actions(admin_page_turner(1)),
            vec![Action::Page { view: ListView::Admin, page: 2 }]
        );
        assert_eq!(
            actions(admin_page_turner(3)),
            vec![
                Action::Page { view: ListView::Admin, page: 2 },
                Action::Page { view: ListView::Admin, page: 4 },
            ]
        );
    }

    #[test]
    fn first_photo_carries_the_caption() {
        let unit = issue_unit(
            "caption".into(),
            Some(admin_controls(12)),
            vec![
                attachment(1, AttachmentKind::Document),
                attachment(2, AttachmentKind::Photo),
                attachment(3, AttachmentKind::Photo),
            ],
        );
        assert_eq!(unit.len(), 3);
        assert!(matches!(
            &unit[0],
            OutboundMessage::Photo { source: MediaSource::Remote(r), caption: Some(_), keyboard: Some(_) } if r == "ref-2"
        ));
        assert!(matches!(&unit[1], OutboundMessage::Document { .. }));
        assert!(matches!(&unit[2], OutboundMessage::Photo { caption: None, .. }));
    }

    #[test]
    fn admin_controls_offer_three_transitions_and_comment() {
        let Keyboard::Inline(rows) = admin_controls(5) else {
            panic!("inline keyboard expected");
        };
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1][0].action, Action::AddComment { issue_id: 5 });
    }
}
