//! Access-code registry.
//!
//! A code moves through `active -> {exhausted | expired | revoked}`; all three
//! end states are terminal. The only transition that touches the use counter
//! is [`AccessCodeRegistry::redeem`], which checks and increments inside a
//! single [`AccessCodeStore::update`] call, so the cap holds under any number
//! of concurrent redeemers.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use playgate_types::models::{AccessCode, CodeStatus};

use crate::authz::{Capability, Principal};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::store::{AccessCodeStore, PlaylistStore};

/// 18 random bytes, 24 characters once encoded.
const CODE_BYTES: usize = 18;

/// Draws attempted before giving up on finding an unused code.
const MAX_DRAWS: usize = 8;

/// Source of candidate code strings.
pub trait CodeSource: Send + Sync {
    fn draw(&self) -> String;
}

/// URL-safe codes drawn from the operating system's CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn draw(&self) -> String {
        let mut bytes = [0u8; CODE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct GenerateCode {
    pub playlist_id: Uuid,
    pub max_uses: Option<i64>,
    pub expiry_hours: Option<i64>,
}

/// A successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub playlist_id: Uuid,
    pub current_uses: u32,
    pub uses_remaining: Option<u32>,
}

pub struct AccessCodeRegistry {
    codes: Arc<dyn AccessCodeStore>,
    playlists: Arc<dyn PlaylistStore>,
    source: Box<dyn CodeSource>,
    clock: Arc<dyn Clock>,
}

impl AccessCodeRegistry {
    pub fn new(
        codes: Arc<dyn AccessCodeStore>,
        playlists: Arc<dyn PlaylistStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_source(codes, playlists, clock, Box::new(RandomCodeSource))
    }

    pub fn with_source(
        codes: Arc<dyn AccessCodeStore>,
        playlists: Arc<dyn PlaylistStore>,
        clock: Arc<dyn Clock>,
        source: Box<dyn CodeSource>,
    ) -> Self {
        Self {
            codes,
            playlists,
            source,
            clock,
        }
    }

    /// Issues a new code for a playlist the actor owns (or any playlist, for
    /// admins). Playlists outside the actor's reach are reported exactly like
    /// unknown ones.
    pub fn generate(&self, actor: &Principal, request: GenerateCode) -> Result<AccessCode> {
        actor.require(Capability::GenerateCode)?;

        let max_uses = match request.max_uses {
            Some(n) if n <= 0 => return Err(Error::InvalidUsageCap),
            Some(n) => Some(u32::try_from(n).map_err(|_| Error::InvalidUsageCap)?),
            None => None,
        };
        let ttl = match request.expiry_hours {
            Some(h) if h <= 0 => return Err(Error::InvalidExpiry),
            Some(h) => Some(Duration::try_hours(h).ok_or(Error::InvalidExpiry)?),
            None => None,
        };

        let playlist = self
            .playlists
            .playlist(request.playlist_id)?
            .filter(|p| actor.owns_or_manages(p.created_by))
            .ok_or(Error::InvalidPlaylist)?;

        let now = self.clock.now();
        let expires_at = match ttl {
            Some(ttl) => Some(now.checked_add_signed(ttl).ok_or(Error::InvalidExpiry)?),
            None => None,
        };

        for attempt in 1..=MAX_DRAWS {
            let code = AccessCode {
                code: self.source.draw(),
                playlist_id: playlist.id,
                created_by: actor.user_id,
                created_at: now,
                expires_at,
                max_uses,
                current_uses: 0,
                is_active: true,
            };

            if self.codes.insert_if_absent(&code)? {
                info!(
                    "{} generated code {} for playlist {} (max_uses={:?}, expires_at={:?})",
                    actor.username, code.code, playlist.id, max_uses, expires_at
                );
                return Ok(code);
            }
            warn!("Access code collision on draw {}, drawing again", attempt);
        }

        Err(Error::Storage(anyhow::anyhow!(
            "No unused access code after {} draws",
            MAX_DRAWS
        )))
    }

    /// Consumes one use of `code`.
    ///
    /// Checks run in the order not-found, revoked, expired, exhausted, and the
    /// increment happens under the same exclusive access as the checks. A
    /// caller that loses a race for the last use gets [`Error::CodeExhausted`].
    pub fn redeem(&self, code: &str) -> Result<Redemption> {
        let now = self.clock.now();
        let record = self.codes.update(code, &mut |record| {
            consume(record, now)?;
            Ok(true)
        })?;

        debug!(
            "Redeemed code for playlist {} ({} uses)",
            record.playlist_id, record.current_uses
        );
        Ok(Redemption {
            playlist_id: record.playlist_id,
            current_uses: record.current_uses,
            uses_remaining: record.uses_remaining(),
        })
    }

    /// Deactivates a code. Codes already in a terminal state are left as they
    /// are and the call still succeeds.
    pub fn revoke(&self, actor: &Principal, code: &str) -> Result<AccessCode> {
        actor.require(Capability::RevokeCode)?;

        let now = self.clock.now();
        let mut changed = false;
        let record = self.codes.update(code, &mut |record| {
            if !actor.owns_or_manages(record.created_by) {
                return Err(Error::CodeNotFound);
            }
            changed = record.status_at(now) == CodeStatus::Active;
            if changed {
                record.is_active = false;
            }
            Ok(changed)
        })?;

        if changed {
            info!("{} revoked code {}", actor.username, record.code);
        }
        Ok(record)
    }

    /// Codes the actor created; admins see every code.
    pub fn list(&self, actor: &Principal) -> Result<Vec<AccessCode>> {
        actor.require(Capability::ListCodes)?;
        let owner = if actor.can(Capability::ManageAnyResource) {
            None
        } else {
            Some(actor.user_id)
        };
        self.codes.codes(owner)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// The redemption transition. Leaves `code` untouched on failure.
fn consume(code: &mut AccessCode, now: DateTime<Utc>) -> Result<()> {
    match code.status_at(now) {
        CodeStatus::Revoked => Err(Error::CodeRevoked),
        CodeStatus::Expired => Err(Error::CodeExpired),
        CodeStatus::Exhausted => Err(Error::CodeExhausted),
        CodeStatus::Active => {
            // An uncapped code still stops at the counter's ceiling.
            code.current_uses = code.current_uses.checked_add(1).ok_or(Error::CodeExhausted)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::{MemoryCatalog, MemoryCodeStore};
    use playgate_types::models::{Playlist, Role};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        registry: AccessCodeRegistry,
        codes: Arc<MemoryCodeStore>,
        clock: Arc<ManualClock>,
        owner: Principal,
        playlist_id: Uuid,
    }

    fn principal(role: Role) -> Principal {
        let now = Utc::now();
        Principal {
            user_id: Uuid::new_v4(),
            username: format!("{}-account", role),
            role,
            issued_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    fn fixture_with(source: Box<dyn CodeSource>) -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let codes = Arc::new(MemoryCodeStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let owner = principal(Role::User);

        let playlist_id = Uuid::new_v4();
        catalog
            .put_playlist(Playlist {
                id: playlist_id,
                name: "Evening".into(),
                description: None,
                channels: vec![],
                is_public: false,
                created_by: owner.user_id,
                created_at: clock.now(),
                expiry_date: None,
            })
            .unwrap();

        let registry =
            AccessCodeRegistry::with_source(codes.clone(), catalog, clock.clone(), source);
        Fixture {
            registry,
            codes,
            clock,
            owner,
            playlist_id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Box::new(RandomCodeSource))
    }

    fn request(playlist_id: Uuid, max_uses: Option<i64>, expiry_hours: Option<i64>) -> GenerateCode {
        GenerateCode {
            playlist_id,
            max_uses,
            expiry_hours,
        }
    }

    #[test]
    fn generated_codes_are_long_and_distinct() {
        let f = fixture();
        let a = f
            .registry
            .generate(&f.owner, request(f.playlist_id, None, None))
            .unwrap();
        let b = f
            .registry
            .generate(&f.owner, request(f.playlist_id, None, None))
            .unwrap();
        assert_eq!(a.code.len(), 24);
        assert_ne!(a.code, b.code);
        assert_eq!(a.current_uses, 0);
        assert!(a.is_active);
    }

    #[test]
    fn generate_validates_input_and_role() {
        let f = fixture();
        assert!(matches!(
            f.registry
                .generate(&principal(Role::Viewer), request(f.playlist_id, None, None)),
            Err(Error::InsufficientRole)
        ));
        assert!(matches!(
            f.registry
                .generate(&f.owner, request(f.playlist_id, Some(0), None)),
            Err(Error::InvalidUsageCap)
        ));
        assert!(matches!(
            f.registry
                .generate(&f.owner, request(f.playlist_id, Some(-3), None)),
            Err(Error::InvalidUsageCap)
        ));
        assert!(matches!(
            f.registry
                .generate(&f.owner, request(f.playlist_id, None, Some(0))),
            Err(Error::InvalidExpiry)
        ));
        assert!(matches!(
            f.registry
                .generate(&f.owner, request(Uuid::new_v4(), None, None)),
            Err(Error::InvalidPlaylist)
        ));
    }

    #[test]
    fn foreign_playlist_looks_unknown() {
        let f = fixture();
        let stranger = principal(Role::User);
        assert!(matches!(
            f.registry
                .generate(&stranger, request(f.playlist_id, None, None)),
            Err(Error::InvalidPlaylist)
        ));
        assert!(
            f.registry
                .generate(&principal(Role::Admin), request(f.playlist_id, None, None))
                .is_ok()
        );
    }

    struct ScriptedSource {
        script: Mutex<Vec<String>>,
        draws: AtomicUsize,
    }

    impl CodeSource for ScriptedSource {
        fn draw(&self) -> String {
            self.draws.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    #[test]
    fn collision_triggers_a_fresh_draw() {
        let source = Arc::new(ScriptedSource {
            script: Mutex::new(vec!["SAME".into(), "SAME".into(), "OTHER".into()]),
            draws: AtomicUsize::new(0),
        });

        struct Shared(Arc<ScriptedSource>);
        impl CodeSource for Shared {
            fn draw(&self) -> String {
                self.0.draw()
            }
        }

        let f = fixture_with(Box::new(Shared(source.clone())));
        let first = f
            .registry
            .generate(&f.owner, request(f.playlist_id, Some(1), None))
            .unwrap();
        f.registry.redeem(&first.code).unwrap();

        let second = f
            .registry
            .generate(&f.owner, request(f.playlist_id, None, None))
            .unwrap();
        assert_eq!(first.code, "SAME");
        assert_eq!(second.code, "OTHER");
        assert_eq!(source.draws.load(Ordering::SeqCst), 3);

        // The colliding draw did not reset the existing code.
        assert_eq!(f.codes.code("SAME").unwrap().unwrap().current_uses, 1);
    }

    #[test]
    fn collisions_are_bounded() {
        let source = ScriptedSource {
            script: Mutex::new(vec!["STUCK".into()]),
            draws: AtomicUsize::new(0),
        };
        let f = fixture_with(Box::new(source));
        f.registry
            .generate(&f.owner, request(f.playlist_id, None, None))
            .unwrap();
        assert!(matches!(
            f.registry
                .generate(&f.owner, request(f.playlist_id, None, None)),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn capped_code_is_exhausted_after_cap() {
        let f = fixture();
        let code = f
            .registry
            .generate(&f.owner, request(f.playlist_id, Some(2), None))
            .unwrap();

        let first = f.registry.redeem(&code.code).unwrap();
        assert_eq!(first.playlist_id, f.playlist_id);
        assert_eq!(first.uses_remaining, Some(1));
        assert_eq!(f.registry.redeem(&code.code).unwrap().uses_remaining, Some(0));
        assert!(matches!(
            f.registry.redeem(&code.code),
            Err(Error::CodeExhausted)
        ));
        assert_eq!(f.codes.code(&code.code).unwrap().unwrap().current_uses, 2);
    }

    #[test]
    fn uncapped_code_stops_at_the_counter_ceiling() {
        let f = fixture();
        let worn = AccessCode {
            code: "worn-out".into(),
            playlist_id: f.playlist_id,
            created_by: f.owner.user_id,
            created_at: f.clock.now(),
            expires_at: None,
            max_uses: None,
            current_uses: u32::MAX,
            is_active: true,
        };
        assert!(f.codes.insert_if_absent(&worn).unwrap());

        assert!(matches!(
            f.registry.redeem("worn-out"),
            Err(Error::CodeExhausted)
        ));
        assert_eq!(f.codes.code("worn-out").unwrap().unwrap().current_uses, u32::MAX);
    }

    #[test]
    fn caps_beyond_the_counter_range_are_rejected() {
        let f = fixture();
        let largest = i64::from(u32::MAX);
        let code = f
            .registry
            .generate(&f.owner, request(f.playlist_id, Some(largest), None))
            .unwrap();
        assert_eq!(code.max_uses, Some(u32::MAX));
        assert!(matches!(
            f.registry
                .generate(&f.owner, request(f.playlist_id, Some(largest + 1), None)),
            Err(Error::InvalidUsageCap)
        ));
    }

    #[test]
    fn unknown_code_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.registry.redeem("does-not-exist"),
            Err(Error::CodeNotFound)
        ));
    }

    #[test]
    fn expiry_beats_remaining_budget() {
        let f = fixture();
        let code = f
            .registry
            .generate(&f.owner, request(f.playlist_id, Some(10), Some(1)))
            .unwrap();

        f.clock.advance(Duration::hours(2));
        assert!(matches!(
            f.registry.redeem(&code.code),
            Err(Error::CodeExpired)
        ));
        assert_eq!(f.codes.code(&code.code).unwrap().unwrap().current_uses, 0);
    }

    #[test]
    fn failure_precedence_is_revoked_then_expired_then_exhausted() {
        let f = fixture();
        let code = f
            .registry
            .generate(&f.owner, request(f.playlist_id, Some(1), Some(1)))
            .unwrap();
        f.registry.redeem(&code.code).unwrap();

        assert!(matches!(
            f.registry.redeem(&code.code),
            Err(Error::CodeExhausted)
        ));
        f.clock.advance(Duration::hours(2));
        assert!(matches!(
            f.registry.redeem(&code.code),
            Err(Error::CodeExpired)
        ));

        let other = f
            .registry
            .generate(&f.owner, request(f.playlist_id, Some(1), Some(1)))
            .unwrap();
        f.registry.revoke(&f.owner, &other.code).unwrap();
        f.clock.advance(Duration::hours(2));
        assert!(matches!(
            f.registry.redeem(&other.code),
            Err(Error::CodeRevoked)
        ));
    }

    #[test]
    fn revoke_is_idempotent() {
        let f = fixture();
        let code = f
            .registry
            .generate(&f.owner, request(f.playlist_id, None, None))
            .unwrap();

        let once = f.registry.revoke(&f.owner, &code.code).unwrap();
        let twice = f.registry.revoke(&f.owner, &code.code).unwrap();
        assert!(!once.is_active);
        assert_eq!(once, twice);
        assert!(matches!(
            f.registry.redeem(&code.code),
            Err(Error::CodeRevoked)
        ));
    }

    #[test]
    fn revoking_an_exhausted_code_changes_nothing() {
        let f = fixture();
        let code = f
            .registry
            .generate(&f.owner, request(f.playlist_id, Some(1), None))
            .unwrap();
        f.registry.redeem(&code.code).unwrap();

        let after = f.registry.revoke(&f.owner, &code.code).unwrap();
        assert!(after.is_active);
        assert_eq!(after.current_uses, 1);
    }

    #[test]
    fn revoke_checks_role_and_ownership() {
        let f = fixture();
        let code = f
            .registry
            .generate(&f.owner, request(f.playlist_id, None, None))
            .unwrap();

        assert!(matches!(
            f.registry.revoke(&principal(Role::Viewer), &code.code),
            Err(Error::InsufficientRole)
        ));
        assert!(matches!(
            f.registry.revoke(&principal(Role::User), &code.code),
            Err(Error::CodeNotFound)
        ));
        assert!(matches!(
            f.registry.revoke(&f.owner, "missing"),
            Err(Error::CodeNotFound)
        ));
        assert!(
            f.registry
                .revoke(&principal(Role::Admin), &code.code)
                .is_ok()
        );
    }

    #[test]
    fn list_is_scoped_to_creator_unless_admin() {
        let f = fixture();
        f.registry
            .generate(&f.owner, request(f.playlist_id, None, None))
            .unwrap();
        let admin = principal(Role::Admin);
        f.registry
            .generate(&admin, request(f.playlist_id, None, None))
            .unwrap();

        assert_eq!(f.registry.list(&f.owner).unwrap().len(), 1);
        assert_eq!(f.registry.list(&admin).unwrap().len(), 2);
        assert!(matches!(
            f.registry.list(&principal(Role::Viewer)),
            Err(Error::InsufficientRole)
        ));
    }

    #[test]
    fn concurrent_redemptions_never_exceed_the_cap() {
        const CAP: i64 = 5;
        const ATTEMPTS: usize = 64;

        let f = fixture();
        let code = f
            .registry
            .generate(&f.owner, request(f.playlist_id, Some(CAP), None))
            .unwrap();

        let results: Vec<Result<Redemption>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..ATTEMPTS)
                .map(|_| scope.spawn(|| f.registry.redeem(&code.code)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let won = results.iter().filter(|r| r.is_ok()).count();
        let exhausted = results
            .iter()
            .filter(|r| matches!(r, Err(Error::CodeExhausted)))
            .count();
        assert_eq!(won, CAP as usize);
        assert_eq!(exhausted, ATTEMPTS - CAP as usize);
        assert_eq!(
            f.codes.code(&code.code).unwrap().unwrap().current_uses,
            CAP as u32
        );
    }

    #[test]
    fn single_use_race_has_one_winner() {
        let f = fixture();
        let code = f
            .registry
            .generate(&f.owner, request(f.playlist_id, Some(1), None))
            .unwrap();

        let (a, b) = std::thread::scope(|scope| {
            let a = scope.spawn(|| f.registry.redeem(&code.code));
            let b = scope.spawn(|| f.registry.redeem(&code.code));
            (a.join().unwrap(), b.join().unwrap())
        });

        assert!(a.is_ok() ^ b.is_ok());
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(Error::CodeExhausted)));
    }
}
