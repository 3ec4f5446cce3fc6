//! Thin adapters for the three OS entry points.
//!
//! Each adapter builds exactly one [`ActivationRequest`] and forwards it
//! synchronously. Payload contents are never inspected.

use std::sync::Arc;

use tracing::debug;

use crate::platform::Clock;
use crate::types::{ActivationRequest, TriggerSource};

/// Receives normalized activation requests.
pub trait ActivationSink {
    fn submit(&mut self, request: ActivationRequest);
}

pub struct TriggerRouter {
    clock: Arc<dyn Clock>,
}

impl TriggerRouter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// `onShow` of an OS voice-interaction session.
    pub fn on_foreground_show(
        &self,
        sink: &mut dyn ActivationSink,
        session: &str,
        payload: Option<String>,
    ) {
        self.forward(sink, TriggerSource::ForegroundShow, Some(session), payload);
    }

    /// Launch from the lock screen. There is no session object.
    pub fn on_keyguard_launch(&self, sink: &mut dyn ActivationSink) {
        self.forward(sink, TriggerSource::KeyguardLaunch, None, None);
    }

    /// `onHandleAssist`; only `content` is carried forward.
    pub fn on_direct_handoff(
        &self,
        sink: &mut dyn ActivationSink,
        session: &str,
        _data: Option<String>,
        _structure: Option<String>,
        content: Option<String>,
    ) {
        self.forward(sink, TriggerSource::DirectHandoff, Some(session), content);
    }

    fn forward(
        &self,
        sink: &mut dyn ActivationSink,
        source: TriggerSource,
        session: Option<&str>,
        payload: Option<String>,
    ) {
        debug!(?source, session, "Routing activation trigger");
        sink.submit(ActivationRequest {
            source,
            session: session.map(str::to_string),
            requested_at: self.clock.now(),
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedClock;

    #[derive(Default)]
    struct Collect(Vec<ActivationRequest>);

    impl ActivationSink for Collect {
        fn submit(&mut self, request: ActivationRequest) {
            self.0.push(request);
        }
    }

    fn router() -> (Arc<FixedClock>, TriggerRouter) {
        let clock = Arc::new(FixedClock::epoch());
        (clock.clone(), TriggerRouter::new(clock))
    }

    #[test]
    fn each_trigger_forwards_one_request() {
        let (clock, router) = router();
        let mut sink = Collect::default();

        router.on_foreground_show(&mut sink, "s1", Some("hello".into()));
        router.on_keyguard_launch(&mut sink);
        router.on_direct_handoff(
            &mut sink,
            "s2",
            Some("data".into()),
            Some("structure".into()),
            None,
        );

        assert_eq!(sink.0.len(), 3);
        assert_eq!(sink.0[0].source, TriggerSource::ForegroundShow);
        assert_eq!(sink.0[0].session.as_deref(), Some("s1"));
        assert_eq!(sink.0[0].payload.as_deref(), Some("hello"));
        assert_eq!(sink.0[0].requested_at, clock.now());

        assert_eq!(sink.0[1].source, TriggerSource::KeyguardLaunch);
        assert_eq!(sink.0[1].session, None);
        assert_eq!(sink.0[1].payload, None);

        assert_eq!(sink.0[2].source, TriggerSource::DirectHandoff);
        assert_eq!(sink.0[2].payload, None);
    }

    #[test]
    fn direct_handoff_payload_is_content() {
        let (_, router) = router();
        let mut sink = Collect::default();

        router.on_direct_handoff(&mut sink, "s1", None, None, Some("content".into()));
        assert_eq!(sink.0[0].payload.as_deref(), Some("content"));
    }
}
