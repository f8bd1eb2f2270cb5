// switcher.rs — 多场景切换条
//
// 场景切换开始时禁用，切换完成后恢复；禁用期间的选择被忽略。

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitcherItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub thumb_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MultipleSwitcher {
    items: Vec<SwitcherItem>,
    active: Option<usize>,
    enabled: bool,
}

impl MultipleSwitcher {
    pub fn new(items: Vec<SwitcherItem>) -> Self {
        let active = if items.is_empty() { None } else { Some(0) };
        Self {
            items,
            active,
            enabled: true,
        }
    }

    pub fn items(&self) -> &[SwitcherItem] {
        &self.items
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// 按下标选择；返回需要进入的场景 id。高亮等切换成功后由 sync_active 更新
    pub fn select(&self, index: usize) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.items.get(index).map(|item| item.id.clone())
    }

    /// multiple 类型热点被点击：按 sceneId 查找条目
    pub fn activate(&self, scene_id: &str) -> Option<String> {
        let index = self.items.iter().position(|item| item.id == scene_id)?;
        self.select(index)
    }

    /// 场景切换开始或完成时同步高亮
    pub fn sync_active(&mut self, scene_id: &str) {
        if let Some(index) = self.items.iter().position(|item| item.id == scene_id) {
            self.active = Some(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switcher() -> MultipleSwitcher {
        let items = ["A", "B", "C"]
            .iter()
            .map(|id| SwitcherItem {
                id: id.to_string(),
                name: id.to_string(),
                thumb_path: None,
            })
            .collect();
        MultipleSwitcher::new(items)
    }

    #[test]
    fn activation_requires_enabled_and_known_scene() {
        let mut s = switcher();
        assert_eq!(s.active_index(), Some(0));
        assert_eq!(s.activate("C").as_deref(), Some("C"));
        assert_eq!(s.active_index(), Some(0));
        s.sync_active("C");
        assert_eq!(s.active_index(), Some(2));

        assert_eq!(s.activate("missing"), None);

        s.disable();
        assert_eq!(s.activate("B"), None);
        assert_eq!(s.select(1), None);
        assert_eq!(s.active_index(), Some(2));

        s.enable();
        assert_eq!(s.select(1).as_deref(), Some("B"));
    }

    #[test]
    fn empty_switcher_has_no_active_item() {
        let mut s = MultipleSwitcher::new(Vec::new());
        assert_eq!(s.active_index(), None);
        assert_eq!(s.select(0), None);
        s.sync_active("A");
        assert_eq!(s.active_index(), None);
    }
}
