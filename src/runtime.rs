// runtime.rs — 多实例上下文与窗口缩放防抖

use crate::config::TourSource;
use crate::error::Result;
use crate::viewer::Viewer;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(u64);

/// 持有所有查看器实例
#[derive(Debug, Default)]
pub struct ViewerRuntime {
    instances: BTreeMap<InstanceId, Viewer>,
    next_id: u64,
}

impl ViewerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并启动一个实例
    pub fn create(&mut self, source: TourSource) -> Result<InstanceId> {
        let mut viewer = Viewer::new(source)?;
        viewer.start()?;
        Ok(self.insert(viewer))
    }

    /// 接管一个已配置好的实例（例如接了传感器或头显的）
    pub fn insert(&mut self, viewer: Viewer) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        self.instances.insert(id, viewer);
        log::debug!("viewer instance {} registered", id.0);
        id
    }

    pub fn get(&self, id: InstanceId) -> Option<&Viewer> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Viewer> {
        self.instances.get_mut(&id)
    }

    pub fn dispose(&mut self, id: InstanceId) -> bool {
        match self.instances.remove(&id) {
            Some(mut viewer) => {
                viewer.dispose();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn viewers_mut(&mut self) -> impl Iterator<Item = &mut Viewer> {
        self.instances.values_mut()
    }
}

/// 连续的缩放只在最后一次之后 200ms 生效
#[derive(Debug, Default)]
pub struct ResizeDispatcher {
    pending: Option<(u32, u32)>,
    last_request: Option<Instant>,
}

impl ResizeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, width: u32, height: u32, now: Instant) {
        self.pending = Some((width, height));
        self.last_request = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// 到期则把尺寸应用到传入的实例，返回应用的尺寸
    pub fn poll<'a>(
        &mut self,
        now: Instant,
        viewers: impl IntoIterator<Item = &'a mut Viewer>,
    ) -> Option<(u32, u32)> {
        let last = self.last_request?;
        if now.saturating_duration_since(last) < RESIZE_DEBOUNCE {
            return None;
        }
        let (width, height) = self.pending.take()?;
        self.last_request = None;
        for viewer in viewers {
            viewer.resize(width, height);
        }
        log::debug!("applied resize {width}x{height}");
        Some((width, height))
    }
}
