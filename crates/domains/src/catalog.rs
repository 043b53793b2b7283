//! Fixed district and category catalog.
//!
//! Intake matches inbound text against these names exactly, and inline
//! filter actions refer to them by index.

pub const DISTRICTS: &[&str] = &["Каменнобродский", "Жовтневый", "Артемовский", "Ленинский"];

pub const CATEGORIES: &[&str] = &[
    "ЖКХ",
    "Дороги и транспорт",
    "Благоустройство и экология",
    "Образование и культура",
    "Безопасность и правопорядок",
    "Связь и цифровые услуги",
];

pub fn district_index(name: &str) -> Option<usize> {
    DISTRICTS.iter().position(|d| *d == name)
}

pub fn category_index(name: &str) -> Option<usize> {
    CATEGORIES.iter().position(|c| *c == name)
}

pub fn is_district(name: &str) -> bool {
    district_index(name).is_some()
}

pub fn is_category(name: &str) -> bool {
    category_index(name).is_some()
}
