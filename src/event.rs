// event.rs — 查看器事件总线
//
// 同步派发，按订阅顺序，单线程。

use crate::overlay::{OverlayData, OverlayId};
use crate::scene::SceneData;
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    OverlayClick,
    PanoClick,
    MultipleActive,
    SceneReady,
    SceneAttach,
    SceneAttachStart,
    RenderProcess,
    VrEnter,
    VrExit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    OverlayClick { id: OverlayId, data: OverlayData },
    /// 点击处的世界方向（单位向量）
    PanoClick(Vec3),
    MultipleActive(OverlayData),
    SceneReady(SceneData),
    SceneAttach(SceneData),
    SceneAttachStart,
    RenderProcess { scene_id: String },
    VrEnter,
    VrExit,
}

impl ViewerEvent {
    pub fn topic(&self) -> Topic {
        match self {
            ViewerEvent::OverlayClick { .. } => Topic::OverlayClick,
            ViewerEvent::PanoClick(_) => Topic::PanoClick,
            ViewerEvent::MultipleActive(_) => Topic::MultipleActive,
            ViewerEvent::SceneReady(_) => Topic::SceneReady,
            ViewerEvent::SceneAttach(_) => Topic::SceneAttach,
            ViewerEvent::SceneAttachStart => Topic::SceneAttachStart,
            ViewerEvent::RenderProcess { .. } => Topic::RenderProcess,
            ViewerEvent::VrEnter => Topic::VrEnter,
            ViewerEvent::VrExit => Topic::VrExit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Handler = Box<dyn FnMut(&ViewerEvent)>;

struct Subscriber {
    id: SubscriptionId,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, topic: Topic, handler: impl FnMut(&ViewerEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            topic,
            handler: Box::new(handler),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn dispatch(&mut self, event: &ViewerEvent) {
        let topic = event.topic();
        for subscriber in self.subscribers.iter_mut().filter(|s| s.topic == topic) {
            (subscriber.handler)(event);
        }
    }

    pub fn has_subscribers(&self, topic: Topic) -> bool {
        self.subscribers.iter().any(|s| s.topic == topic)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn delivers_in_subscription_order_by_topic() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let a = Rc::clone(&log);
        bus.subscribe(Topic::VrEnter, move |_| a.borrow_mut().push("first"));
        let b = Rc::clone(&log);
        bus.subscribe(Topic::VrEnter, move |_| b.borrow_mut().push("second"));
        let c = Rc::clone(&log);
        bus.subscribe(Topic::VrExit, move |_| c.borrow_mut().push("exit"));

        bus.dispatch(&ViewerEvent::VrEnter);
        assert_eq!(*log.borrow(), ["first", "second"]);
    }

    #[test]
    fn unsubscribe_by_handle() {
        let hits = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let h = Rc::clone(&hits);
        let id = bus.subscribe(Topic::PanoClick, move |_| *h.borrow_mut() += 1);

        bus.dispatch(&ViewerEvent::PanoClick(Vec3::Z));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.dispatch(&ViewerEvent::PanoClick(Vec3::Z));

        assert_eq!(*hits.borrow(), 1);
        assert!(!bus.has_subscribers(Topic::PanoClick));
    }
}
