use crate::generator::route::{build_trail, RouteConfig};
use crate::service::auth::hash_password;
use crate::store::{MemoryStore, StoreError, UserRecord};
use chrono::{DateTime, Duration, Utc};
use geotrackcore::model::User;

/// Demo account. Every demo password is `demo123`.
#[derive(Debug, Clone, Copy)]
pub struct DemoAccount {
    pub email: &'static str,
    pub name: &'static str,
    pub device_id: &'static str,
    pub origin: (f64, f64),
}

pub const DEMO_PASSWORD: &str = "demo123";
const DEMO_SALT: &str = "geotrack-demo";

pub const DEMO_ACCOUNTS: [DemoAccount; 3] = [
    DemoAccount {
        email: "ana@example.com",
        name: "Ana Mora",
        device_id: "ana-phone",
        origin: (9.9281, -84.0907),
    },
    DemoAccount {
        email: "leo@example.com",
        name: "Leo Vargas",
        device_id: "leo-phone",
        origin: (9.9355, -84.0514),
    },
    DemoAccount {
        email: "sofia@example.com",
        name: "Sofia Rojas",
        device_id: "sofia-tablet",
        origin: (9.8644, -83.9194),
    },
];

/// Secondary device of the first demo account, so one user owns two trails.
pub const SECOND_DEVICE: &str = "ana-watch";

/// Inserts the demo accounts and their trails. Accounts that already exist
/// are left alone.
pub fn seed_demo(store: &MemoryStore, now: DateTime<Utc>) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for (index, account) in DEMO_ACCOUNTS.iter().enumerate() {
        if store.user_by_email(account.email).is_some() {
            continue;
        }
        let mut user = User::new(account.email, account.name, account.device_id);
        user.last_active = Some(now - Duration::minutes(index as i64 * 5));
        store.insert_user(UserRecord {
            user,
            password_hash: Some(hash_password(DEMO_SALT, DEMO_PASSWORD)),
            salt: DEMO_SALT.to_string(),
        });

        let config = RouteConfig {
            origin_lat: account.origin.0,
            origin_lng: account.origin.1,
            seed: index as u64 + 1,
            ..Default::default()
        };
        for point in build_trail(&config, account.email, account.device_id, now) {
            store.record_location(point)?;
        }
        if index == 0 {
            let older = RouteConfig {
                seed: 99,
                samples: 20,
                ..config
            };
            let end = now - Duration::hours(2);
            for point in build_trail(&older, account.email, SECOND_DEVICE, end) {
                store.record_location(point)?;
            }
        }
        inserted += 1;
    }
    log::info!(
        "seeded {} demo accounts ({} locations stored)",
        inserted,
        store.location_count()
    );
    Ok(inserted)
}
