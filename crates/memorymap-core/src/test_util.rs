//! Helpers shared by unit tests.

use crate::geometry::Geometry;
use crate::model::FeatureDraft;
use crate::remote::MemoryRemote;
use crate::store::FeatureStore;
use std::future::Future;
use std::sync::Arc;

/// Simple blocking executor for tests.
pub fn block_on<F: Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}

/// A remote with one map and a store bound to it.
pub fn store_with_map() -> (Arc<MemoryRemote>, FeatureStore<MemoryRemote>) {
    let remote = Arc::new(MemoryRemote::new());
    let map = remote.seed_map("Trip");
    let store = FeatureStore::new(Arc::clone(&remote), map);
    (remote, store)
}

pub fn point_draft(lng: f64, lat: f64) -> FeatureDraft {
    FeatureDraft::with_default_title(Geometry::Point([lng, lat]))
}
