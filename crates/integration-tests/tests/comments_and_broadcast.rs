use std::time::Duration;

use domains::models::Action;
use domains::IssueStore;
use integration_tests::Harness;
use services::{texts, WebIssueForm};

const CITIZEN: i64 = 940;
const ADMIN: i64 = 9200;

#[tokio::test]
async fn chat_comment_is_two_step_and_reaches_the_owner() {
    let h = Harness::new();
    h.promote(ADMIN).await;
    h.say(CITIZEN, "Не работает лифт").await;
    let id = h.latest_issue_id(CITIZEN).await;

    h.press(ADMIN, Action::AddComment { issue_id: id }).await;
    assert_eq!(h.transport.last_answer().unwrap(), texts::comment_prompt(id));
    assert_eq!(
        h.transport.last_text_to(ADMIN).unwrap(),
        texts::comment_prompt(id)
    );

    h.say(ADMIN, "Заявка передана в управляющую компанию").await;
    assert_eq!(
        h.transport.last_text_to(ADMIN).unwrap(),
        texts::comment_saved(id)
    );
    assert_eq!(
        h.transport.last_text_to(CITIZEN).unwrap(),
        texts::comment_notice(id, "Заявка передана в управляющую компанию")
    );

    let comment = h.store.latest_comment(id).await.unwrap().unwrap();
    let admin = h.store.find_actor(ADMIN).await.unwrap().unwrap();
    assert_eq!(comment.admin_user_id, admin.id);

    // The comment text did not become an issue of the admin's.
    let admin_issues = h.store.list_issues_by_owner(admin.id, 10, 0).await.unwrap();
    assert!(admin_issues.is_empty());

    h.transport.clear();
    h.say(CITIZEN, "/my").await;
    let own = h.transport.texts_to(CITIZEN);
    assert!(own
        .iter()
        .any(|t| t.contains("Комментарий администрации:\nЗаявка передана")));
}

#[tokio::test]
async fn comment_controls_are_admin_only() {
    let h = Harness::new();
    h.say(CITIZEN, "Сломана горка").await;
    let id = h.latest_issue_id(CITIZEN).await;

    h.press(CITIZEN, Action::AddComment { issue_id: id }).await;
    assert_eq!(h.transport.last_answer().unwrap(), texts::ACTION_DENIED);

    // Next text is an ordinary report again.
    h.say(CITIZEN, "И качели тоже").await;
    assert_ne!(h.latest_issue_id(CITIZEN).await, id);
}

#[tokio::test]
async fn pending_comment_is_dropped_once_privilege_is_revoked() {
    let h = Harness::new();
    h.promote(ADMIN).await;
    h.say(CITIZEN, "Не горят фонари").await;
    let id = h.latest_issue_id(CITIZEN).await;

    h.press(ADMIN, Action::AddComment { issue_id: id }).await;
    assert!(h.store.revoke_admin(ADMIN).await);
    h.transport.clear();

    h.say(ADMIN, "Фонари починят завтра").await;

    assert!(h.store.latest_comment(id).await.unwrap().is_none());
    let admin = h.store.find_actor(ADMIN).await.unwrap().unwrap();
    let admin_issues = h.store.list_issues_by_owner(admin.id, 10, 0).await.unwrap();
    assert!(admin_issues.is_empty());
    assert!(h.transport.sent_to(ADMIN).is_empty());
    assert!(h.transport.sent_to(CITIZEN).is_empty());

    // The pending mark is gone: the next text is a report.
    h.say(ADMIN, "Теперь это обращение").await;
    assert_eq!(
        h.store.list_issues_by_owner(admin.id, 10, 0).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn comment_on_a_missing_issue_is_reported() {
    let h = Harness::new();
    h.promote(ADMIN).await;
    h.press(ADMIN, Action::AddComment { issue_id: 777 }).await;
    assert_eq!(
        h.transport.last_answer().unwrap(),
        texts::issue_not_found("777")
    );
}

#[tokio::test]
async fn broadcast_counts_only_successful_sends() {
    let h = Harness::new();
    h.promote(ADMIN).await;
    h.say(CITIZEN, "/start").await;
    h.say(CITIZEN + 1, "/start").await;
    h.say(CITIZEN + 2, "/start").await;
    h.say_in_group(-100_500, CITIZEN, "/help").await;
    h.engine
        .intake()
        .submit_web(WebIssueForm {
            district: "Ленинский".into(),
            category: "Дороги и транспорт".into(),
            description: "С сайта".into(),
            ..WebIssueForm::default()
        })
        .await
        .unwrap();
    h.transport.fail_chat(CITIZEN + 2);

    h.say(ADMIN, "/broadcast Плановое отключение воды 12 мая").await;
    assert_eq!(
        h.transport.last_text_to(ADMIN).unwrap(),
        texts::broadcast_preview("Плановое отключение воды 12 мая")
    );

    h.press(ADMIN, Action::BroadcastConfirm).await;
    assert_eq!(h.transport.last_answer().unwrap(), texts::BROADCAST_STARTED);

    // Targets: three citizens, the group and the admin; one citizen fails.
    assert!(h.wait_for_text(ADMIN, &texts::broadcast_summary(4)).await);
    assert!(h
        .transport
        .texts_to(-100_500)
        .contains(&"Плановое отключение воды 12 мая".to_string()));
    assert!(h.transport.sent_to(0).is_empty());

    let mut log = h.store.broadcasts().await;
    for _ in 0..100 {
        if !log.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        log = h.store.broadcasts().await;
    }
    let admin = h.store.find_actor(ADMIN).await.unwrap().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].sent_count, 4);
    assert_eq!(log[0].created_by, Some(admin.id));

    // The draft was consumed.
    h.press(ADMIN, Action::BroadcastConfirm).await;
    assert_eq!(h.transport.last_answer().unwrap(), texts::BROADCAST_NO_DRAFT);
}

#[tokio::test]
async fn cancelled_draft_is_never_sent() {
    let h = Harness::new();
    h.promote(ADMIN).await;
    h.say(CITIZEN, "/start").await;

    h.say(ADMIN, "/broadcast Не отправлять").await;
    h.press(ADMIN, Action::BroadcastCancel).await;
    assert_eq!(h.transport.last_answer().unwrap(), texts::BROADCAST_CANCELLED);

    h.press(ADMIN, Action::BroadcastConfirm).await;
    assert_eq!(h.transport.last_answer().unwrap(), texts::BROADCAST_NO_DRAFT);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!h
        .transport
        .texts_to(CITIZEN)
        .contains(&"Не отправлять".to_string()));
}

#[tokio::test]
async fn broadcast_needs_privilege_and_text() {
    let h = Harness::new();
    h.say(CITIZEN, "/broadcast Привет всем").await;
    assert_eq!(
        h.transport.last_text_to(CITIZEN).unwrap(),
        texts::PERMISSION_DENIED
    );

    h.promote(ADMIN).await;
    h.say(ADMIN, "/broadcast   ").await;
    assert_eq!(
        h.transport.last_text_to(ADMIN).unwrap(),
        texts::BROADCAST_USAGE
    );
}
