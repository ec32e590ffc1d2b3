/*
Simple i18n helper for notification texts.

This module provides:
- A tiny embedded translations store for UK/EN (compile-time embedded JSON).
- A simple `tr` function to lookup translations by key + optional params.
- A `t` convenience wrapper using the default language (DEFAULT_LANG).

Notes:
- Placeholders in translation strings use single-brace format: `{name}`.
- Default language is `uk`. If a key is missing for the requested language,
  the fallback language will be used.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANG: &str = "uk";

static TRANSLATIONS: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();

const UK_JSON: &str = r#"
{
  "messages.reminder": "⏰ Нагадування: через {lead} хв почнеться відключення для групи {group} ({label}).\n\n🔌 {interval} ({duration})",
  "messages.schedule_changed": "🔄 Графік для групи {group} на {date} змінився!\n\nБуло: {old}\nСтало: {new}",
  "messages.no_outages": "відключень немає",
  "messages.emergency": "🚨 Увага!\n\n{text}",
  "messages.duration": "{hours}год {minutes}хв"
}
"#;

const EN_JSON: &str = r#"
{
  "messages.reminder": "⏰ Reminder: outage for group {group} ({label}) starts in {lead} min.\n\n🔌 {interval} ({duration})",
  "messages.schedule_changed": "🔄 Schedule for group {group} on {date} has changed!\n\nWas: {old}\nNow: {new}",
  "messages.no_outages": "no outages",
  "messages.emergency": "🚨 Attention!\n\n{text}",
  "messages.duration": "{hours}h {minutes}m"
}
"#;

fn load_translations() -> HashMap<String, HashMap<String, String>> {
    let mut map = HashMap::new();
    for (lang, json) in [("uk", UK_JSON), ("en", EN_JSON)] {
        match serde_json::from_str::<HashMap<String, String>>(json) {
            Ok(table) => {
                map.insert(lang.to_string(), table);
            }
            Err(e) => {
                tracing::error!("Failed to parse embedded {} translations: {}", lang, e);
            }
        }
    }
    map
}

/// Lookup a translation by key, rendering `{name}` placeholders from `params`.
/// Falls back to the default language, then to the key itself.
pub fn tr(lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    let translations = TRANSLATIONS.get_or_init(load_translations);
    let lang = lang.unwrap_or(DEFAULT_LANG);

    let template = translations
        .get(lang)
        .and_then(|table| table.get(key))
        .or_else(|| {
            translations
                .get(DEFAULT_LANG)
                .and_then(|table| table.get(key))
        })
        .cloned()
        .unwrap_or_else(|| key.to_string());

    let mut rendered = template;
    if let Some(params) = params {
        for (name, value) in params {
            rendered = rendered.replace(&format!("{{{}}}", name), value);
        }
    }
    rendered
}

/// Convenience wrapper using the default language.
pub fn t(key: &str) -> String {
    tr(None, key, None)
}

/// Render a total outage duration as "Nгод NNхв".
pub fn format_duration(total_minutes: u32) -> String {
    tr(
        None,
        "messages.duration",
        Some(&[
            ("hours", &(total_minutes / 60).to_string()),
            ("minutes", &format!("{:02}", total_minutes % 60)),
        ]),
    )
}
