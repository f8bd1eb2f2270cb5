// i18n.rs — 界面文案
//
// 文案来源（按顺序）：
//   A) assets/i18n/<lang>.json
//   B) assets/i18n.json（{ "<lang>": { "key": "value" } }）
//   C) 内置英文表
// 查找：tr("key") / tr_with("key", &[("name", ...)])，{name} 为占位符

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const FALLBACK_LANG: &str = "en";

static EMBEDDED_EN: Lazy<HashMap<String, String>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../assets/i18n/en.json")).unwrap_or_else(|e| {
        log::error!("embedded English strings are invalid: {e}");
        HashMap::new()
    })
});

#[derive(Debug, Clone, Default)]
pub struct I18n {
    lang: String,
    map: HashMap<String, String>,
}

fn load_json_map(path: &Path) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(map) => Some(map),
        Err(e) => {
            log::warn!("ignoring {}: {e}", path.display());
            None
        }
    }
}

fn load_multi_lang_json(path: &Path, lang: &str) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    let mut all: HashMap<String, HashMap<String, String>> = serde_json::from_str(&text).ok()?;
    all.remove(lang)
}

/// 先找可执行文件旁的 assets，再找工作目录下的 assets
fn find_asset(relative: &Path) -> Option<PathBuf> {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("assets").join(relative)));
    beside_exe
        .into_iter()
        .chain(std::iter::once(PathBuf::from("assets").join(relative)))
        .find(|p| p.exists())
}

impl I18n {
    /// 从 assets 目录加载；找不到时只用内置英文
    pub fn load(lang: impl Into<String>) -> Self {
        let lang = lang.into();
        let per_lang = find_asset(&Path::new("i18n").join(format!("{lang}.json")))
            .and_then(|p| load_json_map(&p));
        let map = per_lang
            .or_else(|| find_asset(Path::new("i18n.json")).and_then(|p| load_multi_lang_json(&p, &lang)))
            .unwrap_or_else(|| {
                if lang != FALLBACK_LANG {
                    log::warn!("no strings for language {lang}, falling back to {FALLBACK_LANG}");
                }
                HashMap::new()
            });
        Self { lang, map }
    }

    pub fn from_map(lang: impl Into<String>, map: HashMap<String, String>) -> Self {
        Self {
            lang: lang.into(),
            map,
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// 缺失的 key 原样返回
    pub fn tr(&self, key: &str) -> String {
        self.map
            .get(key)
            .or_else(|| EMBEDDED_EN.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// 未提供的占位符保持原样
    pub fn tr_with(&self, key: &str, args: &[(&str, String)]) -> String {
        let mut s = self.tr(key);
        for (k, v) in args {
            s = s.replace(&format!("{{{k}}}"), v);
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_embedded_english_then_key() {
        let i18n = I18n::from_map("xx", HashMap::new());
        assert_eq!(i18n.tr("app.title"), "Panorama Tour");
        assert_eq!(i18n.tr("no.such.key"), "no.such.key");
    }

    #[test]
    fn placeholders_are_substituted() {
        let map = HashMap::from([("status.scene".to_string(), "场景：{name}（{n}）".to_string())]);
        let i18n = I18n::from_map("zh-Hans", map);
        assert_eq!(
            i18n.tr_with("status.scene", &[("name", "大厅".to_string())]),
            "场景：大厅（{n}）"
        );
    }
}
