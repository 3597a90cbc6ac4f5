//! The four parked-element kinds the catalogue retries at the end of
//! compilation (`spec.md` §4.4/§9).

use crate::error::IncompleteElement;
use crate::mapping::ResultMapBuilder;

use super::Configuration;

/// A `<resultMap extends="...">` whose parent wasn't built yet.
pub struct DeferredResultMap {
    pub builder: ResultMapBuilder,
}

/// A `<cache-ref namespace="...">` whose target namespace's cache wasn't
/// registered yet.
pub struct DeferredCacheRef {
    pub namespace: String,
    pub target_namespace: String,
}

/// A mapped statement whose compilation referenced something not yet in the
/// catalogue (a `<sql>` fragment from another namespace, a result map, a
/// cache). `retry` re-attempts the whole compilation step against the
/// now-more-complete catalogue; `awaiting` names what it was blocked on, for
/// diagnostics if it never resolves.
pub struct DeferredStatement {
    pub id: String,
    pub awaiting: String,
    pub retry: Box<dyn Fn(&Configuration) -> Result<(), IncompleteElement> + Send + Sync>,
}
