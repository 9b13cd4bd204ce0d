//! Narrow capability interfaces components depend on, in place of a single
//! god-object wiring every sub-component together (§9).

use crate::geo::GeoResolver;
use crate::models::{GeoPoint, PrefixEvent};
use crate::store::SeenStore;
use crate::utils::Ipv4Cidr;

/// What `EventShaper` needs from the persistent seen-prefix store.
pub trait SeenStoreQuery: Send + Sync {
    fn is_seen(&self, prefix: Ipv4Cidr) -> bool;
    fn record(&self, prefix: Ipv4Cidr, origin_asn: u32);
}

impl SeenStoreQuery for SeenStore {
    fn is_seen(&self, prefix: Ipv4Cidr) -> bool {
        SeenStore::is_seen(self, prefix)
    }

    fn record(&self, prefix: Ipv4Cidr, origin_asn: u32) {
        SeenStore::record(self, prefix, origin_asn)
    }
}

/// What `EventShaper` needs from the geolocation resolver.
pub trait GeoResolveQuery: Send + Sync {
    fn resolve(&self, ip: u32) -> Option<GeoPoint>;
}

impl GeoResolveQuery for GeoResolver {
    fn resolve(&self, ip: u32) -> Option<GeoPoint> {
        GeoResolver::resolve(self, ip)
    }
}

/// Sink for fully-labeled events, implemented by whatever consumes the
/// classifier's/shaper's output (MetricsAggregator, EventSink/Pacer, or both
/// via a fan-out wrapper).
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: PrefixEvent);
}

/// Sink the Pacer drains finished pulses into; decouples it from whatever
/// ultimately serves them to a renderer (a bounded channel, a websocket
/// broadcaster, a test probe).
pub trait VisualQueueSink: Send + Sync {
    fn push(&self, pulse: crate::pacer::Pulse);
}

/// Fans one `PrefixEvent` stream out to every emitter in the list, e.g. the
/// `MetricsAggregator` and the `Pacer` both consuming `EventShaper`'s output.
pub struct FanOutEmitter {
    emitters: Vec<std::sync::Arc<dyn EventEmitter>>,
}

impl FanOutEmitter {
    pub fn new(emitters: Vec<std::sync::Arc<dyn EventEmitter>>) -> Self {
        Self { emitters }
    }
}

impl EventEmitter for FanOutEmitter {
    fn emit(&self, event: PrefixEvent) {
        for emitter in &self.emitters {
            emitter.emit(event.clone());
        }
    }
}

/// What `EventShaper` needs from the `AnomalyClassifier` to attach a
/// secondary label to the event it's already building. Kept separate from
/// `EventEmitter` since the classifier's own output is a label, not an event.
pub trait SecondaryClassifier: Send + Sync {
    fn classify_announcement(
        &self,
        prefix: Ipv4Cidr,
        peer: &str,
        as_path: &[u32],
        communities: &[(u32, u32)],
        next_hop: &str,
        aggregator: Option<&str>,
        now_millis: i64,
    ) -> crate::models::SecondaryKind;

    fn classify_withdrawal(
        &self,
        prefix: Ipv4Cidr,
        peer: &str,
        now_millis: i64,
    ) -> crate::models::SecondaryKind;
}
