use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Minimum trimmed length of an accepted plate number.
pub const MIN_PLATE_LEN: usize = 2;

/// Plate numbers are free text; the only rule is a non-trivial trimmed length.
pub fn validate_plate_number(plate: &str) -> bool {
    plate.trim().chars().count() >= MIN_PLATE_LEN
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVehicleRecord {
    pub plate_number: String,
    pub owner_name: Option<String>,
    pub vehicle_type: Option<String>,
    pub notes: Option<String>,
    /// Defaults to the insertion time.
    pub detected_at: Option<DateTime<Local>>,
}

impl NewVehicleRecord {
    pub fn new(plate_number: impl Into<String>) -> Self {
        Self {
            plate_number: plate_number.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: i64,
    pub plate_number: String,
    pub detected_at: DateTime<Local>,
    pub owner_name: Option<String>,
    pub vehicle_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    #[default]
    Plate,
    Owner,
    VehicleType,
}

impl SearchField {
    fn column(self) -> &'static str {
        match self {
            SearchField::Plate => "plate_number",
            SearchField::Owner => "owner_name",
            SearchField::VehicleType => "vehicle_type",
        }
    }
}

impl FromStr for SearchField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plate" | "plate_number" => Ok(SearchField::Plate),
            "owner" | "owner_name" => Ok(SearchField::Owner),
            "type" | "vehicle_type" => Ok(SearchField::VehicleType),
            other => Err(anyhow!(
                "unknown search field '{}' (expected plate, owner or type)",
                other
            )),
        }
    }
}

pub trait VehicleRecordStore {
    /// Insert a record and return its id. Rejects invalid plate numbers.
    fn add_record(&mut self, record: NewVehicleRecord) -> Result<i64>;

    /// Case-insensitive substring match on one field, newest first.
    fn search(&self, term: &str, field: SearchField) -> Result<Vec<VehicleRecord>>;

    fn get_record(&self, id: i64) -> Result<Option<VehicleRecord>>;

    fn count(&self) -> Result<usize>;
}

type RecordRow = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

pub struct SqliteVehicleStore {
    conn: Connection,
}

impl SqliteVehicleStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = crate::open_db_connection(db_path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS vehicle_records (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              plate_number TEXT NOT NULL,
              detected_at TEXT NOT NULL,
              owner_name TEXT,
              vehicle_type TEXT,
              notes TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_vehicle_records_detected
              ON vehicle_records(detected_at);
            "#,
        )?;
        Ok(())
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn collect(rows: Vec<RecordRow>) -> Result<Vec<VehicleRecord>> {
        rows.into_iter()
            .map(|(id, plate_number, detected_at, owner_name, vehicle_type, notes)| {
                Ok(VehicleRecord {
                    id,
                    plate_number,
                    detected_at: parse_timestamp(&detected_at)?,
                    owner_name,
                    vehicle_type,
                    notes,
                })
            })
            .collect()
    }
}

impl VehicleRecordStore for SqliteVehicleStore {
    fn add_record(&mut self, record: NewVehicleRecord) -> Result<i64> {
        let plate = checked_plate(&record.plate_number)?;
        let detected_at = record.detected_at.unwrap_or_else(Local::now);
        self.conn.execute(
            r#"
            INSERT INTO vehicle_records(plate_number, detected_at, owner_name, vehicle_type, notes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                plate,
                format_timestamp(&detected_at),
                record.owner_name,
                record.vehicle_type,
                record.notes
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        log::debug!("vehicle record {} added for plate {}", id, plate);
        Ok(id)
    }

    fn search(&self, term: &str, field: SearchField) -> Result<Vec<VehicleRecord>> {
        let sql = format!(
            "SELECT id, plate_number, detected_at, owner_name, vehicle_type, notes \
             FROM vehicle_records WHERE {} LIKE ?1 ESCAPE '\\' \
             ORDER BY detected_at DESC, id DESC",
            field.column()
        );
        let pattern = format!("%{}%", escape_like(term));
        let rows = {
            let mut stmt = self.conn.prepare(&sql)?;
            let mapped = stmt.query_map(params![pattern], Self::map_row)?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };
        Self::collect(rows)
    }

    fn get_record(&self, id: i64) -> Result<Option<VehicleRecord>> {
        let rows = {
            let mut stmt = self.conn.prepare(
                "SELECT id, plate_number, detected_at, owner_name, vehicle_type, notes \
                 FROM vehicle_records WHERE id = ?1",
            )?;
            let mapped = stmt.query_map(params![id], Self::map_row)?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(Self::collect(rows)?.into_iter().next())
    }

    fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vehicle_records", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryVehicleStore {
    records: Vec<VehicleRecord>,
    next_id: i64,
}

impl VehicleRecordStore for InMemoryVehicleStore {
    fn add_record(&mut self, record: NewVehicleRecord) -> Result<i64> {
        let plate = checked_plate(&record.plate_number)?;
        self.next_id += 1;
        let id = self.next_id;
        self.records.push(VehicleRecord {
            id,
            plate_number: plate.to_string(),
            detected_at: record.detected_at.unwrap_or_else(Local::now),
            owner_name: record.owner_name,
            vehicle_type: record.vehicle_type,
            notes: record.notes,
        });
        Ok(id)
    }

    fn search(&self, term: &str, field: SearchField) -> Result<Vec<VehicleRecord>> {
        let needle = term.to_lowercase();
        let mut out: Vec<VehicleRecord> = self
            .records
            .iter()
            .filter(|record| {
                let value = match field {
                    SearchField::Plate => Some(record.plate_number.as_str()),
                    SearchField::Owner => record.owner_name.as_deref(),
                    SearchField::VehicleType => record.vehicle_type.as_deref(),
                };
                value.is_some_and(|v| v.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(out)
    }

    fn get_record(&self, id: i64) -> Result<Option<VehicleRecord>> {
        Ok(self.records.iter().find(|r| r.id == id).cloned())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }
}

/// PBKDF2-HMAC-SHA256 rounds for newly stored passwords.
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 100_000;

const PASSWORD_SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Operator account as stored; the password hash never leaves the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Local>,
}

/// Operator accounts with salted password hashes.
pub trait UserStore {
    /// Create an account. Fails on an empty username or password, or when the
    /// username is taken.
    fn register(&mut self, username: &str, password: &str) -> Result<i64>;

    /// True iff the account exists and the password matches.
    fn login(&self, username: &str, password: &str) -> Result<bool>;

    fn get_user(&self, username: &str) -> Result<Option<UserAccount>>;
}

/// Hash `password` as `pbkdf2-sha256$<rounds>$<salt hex>$<hash hex>`.
pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let hash = derive_key(password, &salt, iterations);
    format!(
        "{}${}${}${}",
        PASSWORD_SCHEME,
        iterations,
        hex::encode(salt),
        hex::encode(hash.as_slice())
    )
}

/// Check `password` against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(PASSWORD_SCHEME), Some(rounds), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let (Ok(iterations), Ok(salt), Ok(expected)) =
        (rounds.parse::<u32>(), hex::decode(salt), hex::decode(expected))
    else {
        return false;
    };
    if iterations == 0 || expected.len() != HASH_LEN {
        return false;
    }
    let actual = derive_key(password, &salt, iterations);
    constant_time_eq(actual.as_slice(), &expected)
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; HASH_LEN]> {
    let mut out = Zeroizing::new([0u8; HASH_LEN]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, out.as_mut_slice());
    out
}

// Runs over every byte regardless of where the first mismatch is.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn checked_credentials<'a>(username: &'a str, password: &str) -> Result<&'a str> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(anyhow!("username and password are required"));
    }
    Ok(username)
}

pub struct SqliteUserStore {
    conn: Connection,
    iterations: u32,
}

impl SqliteUserStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = crate::open_db_connection(db_path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              username TEXT UNIQUE NOT NULL,
              password_hash TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn,
            iterations: DEFAULT_PASSWORD_ITERATIONS,
        })
    }

    /// Rounds used for accounts registered from now on.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }
}

impl UserStore for SqliteUserStore {
    fn register(&mut self, username: &str, password: &str) -> Result<i64> {
        let username = checked_credentials(username, password)?;
        let inserted = self.conn.execute(
            "INSERT INTO users(username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![
                username,
                hash_password(password, self.iterations),
                format_timestamp(&Local::now())
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(anyhow!("username '{}' already exists", username));
            }
            Err(e) => return Err(e.into()),
        }
        let id = self.conn.last_insert_rowid();
        log::info!("registered user {} (id {})", username, id);
        Ok(id)
    }

    fn login(&self, username: &str, password: &str) -> Result<bool> {
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT password_hash FROM users WHERE username = ?1",
                params![username.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(stored.is_some_and(|hash| verify_password(password, &hash)))
    }

    fn get_user(&self, username: &str) -> Result<Option<UserAccount>> {
        let row: Option<(i64, String, String)> = self
            .conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE username = ?1",
                params![username.trim()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        row.map(|(id, username, created_at)| -> Result<UserAccount> {
            Ok(UserAccount {
                id,
                username,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }
}

#[derive(Clone, Debug)]
struct StoredUser {
    account: UserAccount,
    password_hash: String,
}

#[derive(Clone, Debug)]
pub struct InMemoryUserStore {
    users: HashMap<String, StoredUser>,
    next_id: i64,
    iterations: u32,
}

impl InMemoryUserStore {
    pub fn new(iterations: u32) -> Self {
        Self {
            users: HashMap::new(),
            next_id: 0,
            iterations: iterations.max(1),
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWORD_ITERATIONS)
    }
}

impl UserStore for InMemoryUserStore {
    fn register(&mut self, username: &str, password: &str) -> Result<i64> {
        let username = checked_credentials(username, password)?;
        if self.users.contains_key(username) {
            return Err(anyhow!("username '{}' already exists", username));
        }
        self.next_id += 1;
        let account = UserAccount {
            id: self.next_id,
            username: username.to_string(),
            created_at: Local::now(),
        };
        self.users.insert(
            username.to_string(),
            StoredUser {
                account,
                password_hash: hash_password(password, self.iterations),
            },
        );
        Ok(self.next_id)
    }

    fn login(&self, username: &str, password: &str) -> Result<bool> {
        Ok(self
            .users
            .get(username.trim())
            .is_some_and(|user| verify_password(password, &user.password_hash)))
    }

    fn get_user(&self, username: &str) -> Result<Option<UserAccount>> {
        Ok(self.users.get(username.trim()).map(|u| u.account.clone()))
    }
}

fn checked_plate(plate: &str) -> Result<&str> {
    if !validate_plate_number(plate) {
        return Err(anyhow!(
            "invalid plate number '{}': at least {} characters required",
            plate,
            MIN_PLATE_LEN
        ));
    }
    Ok(plate.trim())
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// Fixed-width UTC text sorts chronologically in SQL.
fn format_timestamp(at: &DateTime<Local>) -> String {
    at.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Local))
        .map_err(|e| anyhow!("corrupt timestamp '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .earliest()
            .unwrap()
            + Duration::minutes(minutes)
    }

    fn seed(store: &mut dyn VehicleRecordStore) {
        store
            .add_record(NewVehicleRecord {
                owner_name: Some("Dana Smith".into()),
                vehicle_type: Some("Sedan".into()),
                detected_at: Some(at(0)),
                ..NewVehicleRecord::new("ABC123")
            })
            .unwrap();
        store
            .add_record(NewVehicleRecord {
                owner_name: Some("Lee Park".into()),
                vehicle_type: Some("Truck".into()),
                detected_at: Some(at(5)),
                ..NewVehicleRecord::new("XYZ_99")
            })
            .unwrap();
        store
            .add_record(NewVehicleRecord {
                vehicle_type: Some("sedan".into()),
                detected_at: Some(at(10)),
                ..NewVehicleRecord::new("abc777")
            })
            .unwrap();
    }

    fn exercise(store: &mut dyn VehicleRecordStore) {
        seed(store);
        assert_eq!(store.count().unwrap(), 3);

        let plates: Vec<_> = store
            .search("abc", SearchField::Plate)
            .unwrap()
            .into_iter()
            .map(|r| r.plate_number)
            .collect();
        assert_eq!(plates, vec!["abc777", "ABC123"]);

        let owners = store.search("park", SearchField::Owner).unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].plate_number, "XYZ_99");

        assert_eq!(store.search("SEDAN", SearchField::VehicleType).unwrap().len(), 2);
        // '_' is literal, not a wildcard
        assert_eq!(store.search("Z_9", SearchField::Plate).unwrap().len(), 1);
        assert!(store.search("C_2", SearchField::Plate).unwrap().is_empty());

        assert!(store.add_record(NewVehicleRecord::new(" x ")).is_err());
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn plate_validation() {
        assert!(!validate_plate_number(""));
        assert!(!validate_plate_number("  A "));
        assert!(validate_plate_number(" AB "));
    }

    #[test]
    fn in_memory_search() {
        exercise(&mut InMemoryVehicleStore::default());
    }

    #[test]
    fn sqlite_search() {
        let mut store = SqliteVehicleStore::open(&crate::shared_memory_uri()).unwrap();
        exercise(&mut store);
    }

    #[test]
    fn sqlite_round_trips_timestamps() {
        let mut store = SqliteVehicleStore::open(&crate::shared_memory_uri()).unwrap();
        let id = store
            .add_record(NewVehicleRecord {
                notes: Some("gate 2".into()),
                detected_at: Some(at(3)),
                ..NewVehicleRecord::new("  KL-44 ")
            })
            .unwrap();
        let record = store.get_record(id).unwrap().unwrap();
        assert_eq!(record.plate_number, "KL-44");
        assert_eq!(record.detected_at, at(3));
        assert_eq!(record.notes.as_deref(), Some("gate 2"));
        assert!(store.get_record(id + 1).unwrap().is_none());
    }

    // Low round count keeps debug-build tests fast; the format is the same.
    const TEST_ROUNDS: u32 = 1_000;

    fn exercise_users(store: &mut dyn UserStore) {
        let id = store.register("operator", "s3cret!").unwrap();
        assert!(store.login("operator", "s3cret!").unwrap());
        assert!(!store.login("operator", "s3cret").unwrap());
        assert!(!store.login("nobody", "s3cret!").unwrap());

        let err = store.register("operator", "other").unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");
        assert!(store.register("", "pw").is_err());
        assert!(store.register("  ", "pw").is_err());
        assert!(store.register("guard", "").is_err());

        let account = store.get_user("operator").unwrap().unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.username, "operator");
        assert!(store.get_user("guard").unwrap().is_none());
    }

    #[test]
    fn in_memory_users() {
        exercise_users(&mut InMemoryUserStore::new(TEST_ROUNDS));
    }

    #[test]
    fn sqlite_users() {
        let mut store = SqliteUserStore::open(&crate::shared_memory_uri())
            .unwrap()
            .with_iterations(TEST_ROUNDS);
        exercise_users(&mut store);
    }

    #[test]
    fn password_hashes_are_salted() {
        let a = hash_password("hunter2", TEST_ROUNDS);
        let b = hash_password("hunter2", TEST_ROUNDS);
        assert_ne!(a, b);
        assert!(a.starts_with("pbkdf2-sha256$1000$"));
        assert!(verify_password("hunter2", &a));
        assert!(verify_password("hunter2", &b));
        assert!(!verify_password("hunter3", &a));
    }

    #[test]
    fn malformed_hashes_never_match() {
        for stored in [
            "",
            "plain-text",
            "pbkdf2-sha256$0$00$00",
            "pbkdf2-sha256$1000$zz$00",
            "pbkdf2-sha256$1000$00$0000",
            "md5$1000$00$00",
        ] {
            assert!(!verify_password("anything", stored), "{stored}");
        }
    }

    #[test]
    fn constant_time_eq_checks_length_and_bytes() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
