//! User-facing strings. Everything the bot says lives here.

use domains::models::IssueStatus;
use domains::DomainError;
use rand::seq::IndexedRandom;

pub const GREETINGS: &[&str] = &[
    "Здравствуйте! Я помощник Фоксик. Расскажите, какая у вас проблема?",
    "Приветствую! Опишите вашу ситуацию — я зафиксирую обращение.",
    "Добрый день! Готов принять ваше сообщение о проблеме.",
    "Фоксик на связи! Чем могу помочь?",
    "Здравствуйте! Опишите проблему, и я передам информацию ответственным.",
];

pub const ACKNOWLEDGEMENTS: &[&str] = &[
    "Ваше обращение зарегистрировано. Номер заявки: ",
    "Спасибо за сообщение! Заявка принята в работу, ее номер: ",
    "Информация получена. Мы уже занимаемся вашим вопросом. Номер вашей заявки: ",
    "Заявка зафиксирована. Скоро с вами свяжутся. Номер вашей заявки: ",
    "Принято! Мы получили ваше сообщение и передадим его специалистам. Ваша заявка под номером: ",
];

// Menu labels (reply keyboard keys arrive back as plain text)
pub const MENU_MY_ISSUES: &str = "Мои обращения";
pub const MENU_HELP: &str = "FAQ / Помощь";
pub const MENU_PREVIOUS: &str = "⬅ Предыдущая";
pub const MENU_NEXT: &str = "Следующая ➡";

pub const HELP_MENU: &str = "Справка: отправьте текст проблемы, по желанию фото/видео и геопозицию.\n\
/my — мои обращения.\n\
/issues — просмотр активных заявок (для админов).";
pub const HELP_COMMAND: &str = "Справка: отправьте текст проблемы, фото/видео и геолокацию. \
В группах бот сообщения не обрабатывает. \
Для администраторов: /admin <секрет>, /export <период>, /broadcast \"текст\".";

// Intake
pub const START_CHOOSE_DISTRICT: &str = "Для начала выберите район, в котором возникла проблема.";
pub const ADD_CHOOSE_DISTRICT: &str =
    "Создаём новое обращение.\nСначала выберите район, в котором возникла проблема.";
pub const CATEGORY_BEFORE_DISTRICT: &str = "Сначала выберите район командой /add или /start.";
pub const LOCATION_NO_ELIGIBLE: &str = "Не нашёл недавнее обращение без координат. \
Сначала отправьте текст с описанием проблемы, потом геопозицию.";
pub const LOCATION_SEND_TEXT_FIRST: &str =
    "Сначала отправьте текст с описанием проблемы, затем геопозицию.";
pub const ISSUE_CREATE_FAILED: &str = "Не удалось создать заявку. Попробуйте позже.";

// Permissions and failures
pub const PERMISSION_DENIED: &str = "Недостаточно прав";
pub const ACTION_DENIED: &str = "Нет прав";
pub const GENERIC_FAILURE: &str = "Произошла ошибка. Попробуйте позже.";
pub const STATUS_FAILED: &str = "Ошибка статуса";

// Admin bootstrap
pub const ADMIN_USAGE: &str = "Укажите секрет: /admin <секрет>";
pub const ADMIN_WRONG_SECRET: &str = "Неверный секрет";
pub const ADMIN_GRANTED: &str = "Права администратора выданы. Доступны команды /export, /broadcast, /issues. \
Новые заявки будут приходить автоматически.";

// Export
pub const EXPORT_USAGE: &str = "Формат: /export YYYY-MM-DD..YYYY-MM-DD";
pub const EXPORT_FILE_NAME: &str = "export.csv";

// Broadcast
pub const BROADCAST_USAGE: &str =
    "Использование: /broadcast \"Текст\" — будет предпросмотр и подтверждение.";
pub const BROADCAST_CONFIRM: &str = "✅ Подтвердить";
pub const BROADCAST_CANCEL: &str = "❌ Отмена";
pub const BROADCAST_NO_DRAFT: &str = "Нет черновика";
pub const BROADCAST_STARTED: &str = "Рассылка запущена";
pub const BROADCAST_CANCELLED: &str = "Отменено";

// Lists
pub const OWN_NO_ACTOR: &str = "Нет обращений";
pub const OWN_EMPTY: &str = "Пока нет обращений";
pub const OWN_EMPTY_PAGE: &str = "На этой странице обращений нет.";
pub const ADMIN_EMPTY: &str = "Нет новых или активных заявок.";
pub const ADMIN_EMPTY_PAGE: &str = "На этой странице заявок нет.";
pub const ADMIN_PAGE_TURNER: &str = "Листать заявки:";
pub const NO_TEXT: &str = "(без текста)";
pub const COMMENT_BUTTON: &str = "💬 Комментарий";

// Filter menus
pub const FILTER_DISTRICT_PROMPT: &str = "Выберите район для фильтрации заявок:";
pub const FILTER_CATEGORY_PROMPT: &str = "Выберите категорию для фильтрации:";
pub const FILTER_ALL_DISTRICTS: &str = "Все районы";
pub const FILTER_ALL_CATEGORIES: &str = "Все категории";
pub const FILTER_DISTRICT_CHOSEN: &str = "Район выбран";
pub const FILTER_APPLIED: &str = "Фильтр применён";

pub fn greeting() -> &'static str {
    GREETINGS.choose(&mut rand::rng()).copied().unwrap_or(GREETINGS[0])
}

/// Wizard submissions get a random wording.
pub fn acknowledgement(issue_id: i64) -> String {
    let prefix = ACKNOWLEDGEMENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(ACKNOWLEDGEMENTS[0]);
    format!("{prefix}{issue_id}")
}

pub fn direct_acknowledgement(issue_id: i64) -> String {
    format!("Заявка принята, номер {issue_id}")
}

pub fn district_chosen(district: &str) -> String {
    format!("Район: {district}\nТеперь выберите категорию проблемы.")
}

pub fn category_chosen(district: &str, category: &str) -> String {
    format!(
        "Район: {district}\nКатегория: {category}\n\nТеперь опишите проблему текстом, \
         при необходимости приложите фото/видео и отправьте геопозицию."
    )
}

pub fn location_attached(issue_id: i64) -> String {
    format!("Геопозиция добавлена к заявке #{issue_id}")
}

pub fn comment_prompt(issue_id: i64) -> String {
    format!("Напишите комментарий к заявке #{issue_id}")
}

pub fn comment_saved(issue_id: i64) -> String {
    format!("Комментарий добавлен к заявке #{issue_id}")
}

pub fn comment_notice(issue_id: i64, text: &str) -> String {
    format!("Комментарий по вашей заявке #{issue_id}:\n\n{text}")
}

pub fn status_answer(issue_id: i64, status: IssueStatus) -> String {
    format!("Статус #{issue_id}: {status}")
}

pub fn status_notice(issue_id: i64, status: IssueStatus) -> String {
    format!("Статус вашей заявки #{issue_id} изменён на: {status}")
}

pub fn broadcast_preview(text: &str) -> String {
    format!("Предпросмотр рассылки:\n\n{text}")
}

pub fn broadcast_summary(sent: usize) -> String {
    format!("Рассылка доставлена: {sent} чатов")
}

pub fn digest(total_new: i64, recent_new: i64) -> String {
    format!(
        "Общее количество заявок со статусом \"{}\": {total_new}\n\
         Количество новых заявок за последние 15 минут: {recent_new}",
        IssueStatus::New
    )
}

pub fn export_done(from: &str, to: &str) -> String {
    format!("Экспорт за период: {from}..{to}")
}

pub fn page_answer(page: u32) -> String {
    format!("Страница {page}")
}

pub fn own_header(page: u32) -> String {
    format!("Ваши обращения (страница {page}):")
}

pub fn issue_not_found(issue_id: &str) -> String {
    format!("Заявка #{issue_id} не найдена")
}

/// Inline reply for a failed operation. Storage and delivery details stay in
/// the logs.
pub fn for_error(err: &DomainError) -> String {
    match err {
        DomainError::Validation(message) => message.clone(),
        DomainError::NotFound("issue", id) => issue_not_found(id),
        DomainError::NotFound(what, id) => format!("Не найдено: {what} {id}"),
        DomainError::PermissionDenied => PERMISSION_DENIED.to_string(),
        DomainError::Storage(_) | DomainError::Delivery(_) => GENERIC_FAILURE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::StoreError;

    #[test]
    fn random_wordings_come_from_fixed_sets() {
        assert!(GREETINGS.contains(&greeting()));
        let ack = acknowledgement(42);
        assert!(ack.ends_with("42"));
        assert!(ACKNOWLEDGEMENTS.iter().any(|p| ack.starts_with(p)));
    }

    #[test]
    fn storage_failures_stay_generic() {
        let err = DomainError::Storage(StoreError::Backend("password rejected".into()));
        assert_eq!(for_error(&err), GENERIC_FAILURE);
        assert_eq!(
            for_error(&DomainError::issue_not_found(9)),
            "Заявка #9 не найдена"
        );
    }
}
