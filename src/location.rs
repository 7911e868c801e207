use std::sync::Mutex;

/// Latitude/longitude pair attached to ledger entries. (0, 0) means the
/// position was never captured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const ORIGIN: Coordinates = Coordinates {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn is_origin(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// Best-effort position source. Implementations must never fail into the
/// engine; an unavailable fix is simply `None`.
pub trait LocationSource: Send + Sync {
    fn last_known(&self) -> Option<Coordinates>;
    fn report(&self, coords: Coordinates);
}

/// Remembers the most recent fix reported by any caller (transfers carry
/// client-supplied coordinates; bill payments read this cache back).
#[derive(Default)]
pub struct LastFixCache {
    last: Mutex<Option<Coordinates>>,
}

impl LocationSource for LastFixCache {
    fn last_known(&self) -> Option<Coordinates> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn report(&self, coords: Coordinates) {
        if coords.is_origin() {
            return;
        }
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(coords);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keeps_latest_fix_and_ignores_origin() {
        let cache = LastFixCache::default();
        assert_eq!(cache.last_known(), None);

        let blr = Coordinates {
            latitude: 12.97,
            longitude: 77.59,
        };
        cache.report(blr);
        assert_eq!(cache.last_known(), Some(blr));

        // An uncaptured (0, 0) report must not clobber a real fix.
        cache.report(Coordinates::ORIGIN);
        assert_eq!(cache.last_known(), Some(blr));
    }
}
