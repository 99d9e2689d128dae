use chrono::{DateTime, Timelike, Utc};
use uuid::Uuid;

/// Format version written into new databases (3.13).
pub const FORMAT_VERSION_MAJOR: u8 = 0x03;
pub const FORMAT_VERSION_MINOR: u8 = 0x0d;

/// Database-wide metadata from the header group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    pub version_major: u8,
    pub version_minor: u8,
    pub last_save: Option<DateTime<Utc>>,
    pub program: String,
    pub user: String,
    pub host: String,
}

impl Headers {
    pub fn new() -> Self {
        Self {
            version_major: FORMAT_VERSION_MAJOR,
            version_minor: FORMAT_VERSION_MINOR,
            ..Self::default()
        }
    }
}

/// One password entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub uuid: Uuid,
    pub group: String,
    pub title: String,
    pub username: String,
    pub notes: String,
    pub password: String,
    pub created: Option<DateTime<Utc>>,
    pub url: String,
    pub email: String,
}

impl Record {
    /// A fresh record with a random UUID, created now.
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            created: Some(now_seconds()),
            ..Self::default()
        }
    }
}

/// A decoded database: headers plus records in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Safe {
    pub headers: Headers,
    pub records: Vec<Record>,
}

impl Safe {
    pub fn new() -> Self {
        Self {
            headers: Headers::new(),
            records: Vec::new(),
        }
    }

    /// Record indices ordered by group, then title.
    pub fn sorted_indices(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.records.len()).collect();
        idx.sort_by(|&a, &b| {
            let (ra, rb) = (&self.records[a], &self.records[b]);
            (&ra.group, &ra.title).cmp(&(&rb.group, &rb.title))
        });
        idx
    }

    /// Records ordered by group, then title.
    pub fn sorted_records(&self) -> Vec<&Record> {
        self.sorted_indices()
            .into_iter()
            .map(|i| &self.records[i])
            .collect()
    }

    /// Fills the last-save metadata right before writing.
    ///
    /// User and host are left unchanged when they cannot be determined.
    pub fn stamp_save(&mut self, program: &str) {
        self.headers.last_save = Some(now_seconds());
        self.headers.program = program.to_string();

        if let Some(user) = current_user() {
            self.headers.user = user;
        }
        if let Some(host) = hostname::get().ok().and_then(|h| h.into_string().ok()) {
            self.headers.host = host;
        }
    }
}

/// Current time truncated to whole seconds, the resolution stored on disk.
pub(crate) fn now_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

fn current_user() -> Option<String> {
    ["USER", "USERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|u| !u.is_empty())
}
