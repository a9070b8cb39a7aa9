use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use common::models::{Mentor, MentorRegistration};
use common::{RelayError, RelayResult};
use storage::RecordStore;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::keygen;

type IdSource = Box<dyn Fn() -> String + Send + Sync>;

#[derive(Default)]
struct Directory {
    by_id: HashMap<String, Mentor>,
    id_by_email: HashMap<String, String>,
    /// Ids held by credentials outside the directory; never handed out.
    reserved: HashSet<String>,
}

impl Directory {
    fn is_taken(&self, id: &str) -> bool {
        self.by_id.contains_key(id) || self.reserved.contains(id)
    }

    fn insert(&mut self, mentor: Mentor) {
        self.id_by_email
            .insert(mentor.email.clone(), mentor.mentor_id.clone());
        self.by_id.insert(mentor.mentor_id.clone(), mentor);
    }
}

pub struct MentorDirectory {
    inner: RwLock<Directory>,
    store: Arc<dyn RecordStore>,
    id_source: IdSource,
}

impl MentorDirectory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            inner: RwLock::new(Directory::default()),
            store,
            id_source: Box::new(keygen::generate_mentor_id),
        }
    }

    pub fn with_id_source(mut self, source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.id_source = Box::new(source);
        self
    }

    /// Keeps `mentor_id` out of registration, e.g. the id the legacy bearer token acts as.
    pub fn reserve_id(mut self, mentor_id: impl Into<String>) -> Self {
        self.inner.get_mut().reserved.insert(mentor_id.into());
        self
    }

    pub async fn restore(&self, mentors: Vec<Mentor>) {
        let mut inner = self.inner.write().await;
        for mentor in mentors {
            if inner.reserved.contains(&mentor.mentor_id) {
                warn!(
                    "Skipping stored mentor {} ({}): id is reserved",
                    mentor.mentor_id, mentor.email
                );
                continue;
            }
            inner.insert(mentor);
        }
    }

    /// Idempotent by email: a known email returns the existing id.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        requested_id: Option<&str>,
    ) -> RelayResult<MentorRegistration> {
        let name = name.trim();
        let email = email.trim().to_lowercase();

        let mut invalid = Vec::new();
        if name.is_empty() {
            invalid.push("name");
        }
        if !looks_like_email(&email) {
            invalid.push("email");
        }
        if !invalid.is_empty() {
            return Err(RelayError::validation(invalid));
        }

        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.id_by_email.get(&email) {
            debug!("Mentor {} already registered as {}", email, existing);
            return Ok(MentorRegistration {
                mentor_id: existing.clone(),
                already_registered: true,
            });
        }

        let requested = requested_id
            .map(str::trim)
            .filter(|id| !id.is_empty() && !inner.is_taken(id));
        let mentor_id = match requested {
            Some(id) => id.to_string(),
            None => loop {
                let candidate = (self.id_source)();
                if !inner.is_taken(&candidate) {
                    break candidate;
                }
                debug!("Mentor id collision on {}, regenerating", candidate);
            },
        };

        let mentor = Mentor {
            mentor_id: mentor_id.clone(),
            name: name.to_string(),
            email,
            active: true,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_mentor(&mentor).await {
            error!("Failed to persist mentor {}: {}", mentor_id, e);
            return Err(RelayError::Backend("mentor store unavailable".into()));
        }
        info!("Registered mentor {} ({})", mentor.mentor_id, mentor.email);
        inner.insert(mentor);

        Ok(MentorRegistration {
            mentor_id,
            already_registered: false,
        })
    }

    /// The mentor, if it exists and is active.
    pub async fn validate(&self, mentor_id: &str) -> Option<Mentor> {
        let inner = self.inner.read().await;
        if inner.reserved.contains(mentor_id) {
            return None;
        }
        inner.by_id.get(mentor_id).filter(|m| m.active).cloned()
    }

    pub async fn deactivate(&self, mentor_id: &str) -> RelayResult<Mentor> {
        let mut inner = self.inner.write().await;
        let mentor = inner
            .by_id
            .get_mut(mentor_id)
            .ok_or_else(|| RelayError::NotFound("mentor".into()))?;

        if mentor.active {
            if let Err(e) = self.store.set_mentor_active(mentor_id, false).await {
                error!("Failed to persist deactivation of mentor {}: {}", mentor_id, e);
                return Err(RelayError::Backend("mentor store unavailable".into()));
            }
            mentor.active = false;
            info!("Mentor {} deactivated", mentor_id);
        }
        Ok(mentor.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}
