//! HTTP implementation of [`MeetingStore`] against the hosted row API.
//!
//! The API is PostgREST-shaped: one resource per table, `column=eq.value`
//! filters, `order=` for sorted reads, PATCH for partial updates and
//! `Prefer: return=representation` when the inserted row is needed back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::model::{Meeting, Note, Participant, Question, RegisteredUser, StoredParticipant};

use super::store::{MeetingStore, StoreError};

pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}/{}", self.base_url, table));
        if let Some(key) = &self.api_key {
            request = request
                .header("apikey", key)
                .bearer_auth(key);
        }
        request
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let response = self
            .request(Method::GET, table)
            .query(query)
            .send()
            .await?;
        let rows = Self::check(response).await?.json().await?;
        Ok(rows)
    }

    /// Single-row read; an empty result set is `NotFound`.
    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<T, StoreError> {
        let mut rows: Vec<T> = self.select(table, query).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(rows.swap_remove(0))
    }

    async fn insert<T: Serialize>(&self, table: &str, row: &T) -> Result<(), StoreError> {
        let response = self
            .request(Method::POST, table)
            .json(&[row])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn insert_returning<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<R, StoreError> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        let mut rows: Vec<R> = Self::check(response).await?.json().await?;
        if rows.is_empty() {
            // The API accepted the insert but returned nothing to adopt.
            return Err(StoreError::Rejected {
                status: StatusCode::OK.as_u16(),
                message: "insert returned no representation".to_string(),
            });
        }
        Ok(rows.swap_remove(0))
    }

    async fn patch(
        &self,
        table: &str,
        query: &[(&str, String)],
        body: serde_json::Value,
    ) -> Result<(), StoreError> {
        let response = self
            .request(Method::PATCH, table)
            .query(query)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl MeetingStore for RestBackend {
    async fn meeting(&self, id: &str) -> Result<Meeting, StoreError> {
        self.select_one("meetings", &[("id", format!("eq.{id}"))])
            .await
    }

    async fn open_meetings(&self) -> Result<Vec<Meeting>, StoreError> {
        self.select(
            "meetings",
            &[
                ("completed", "eq.false".to_string()),
                ("order", "startDate.asc".to_string()),
            ],
        )
        .await
    }

    async fn create_meeting(&self, meeting: &Meeting) -> Result<(), StoreError> {
        self.insert("meetings", meeting).await
    }

    async fn update_participants(
        &self,
        meeting_id: &str,
        participants: &[Participant],
    ) -> Result<(), StoreError> {
        let stored: Vec<StoredParticipant> =
            participants.iter().map(Participant::to_stored).collect();
        self.patch(
            "meetings",
            &[("id", format!("eq.{meeting_id}"))],
            json!({ "participants": stored }),
        )
        .await
    }

    async fn set_meeting_ended(
        &self,
        meeting_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.patch(
            "meetings",
            &[("id", format!("eq.{meeting_id}"))],
            json!({ "endDate": ended_at }),
        )
        .await
    }

    async fn set_meeting_completed(&self, meeting_id: &str) -> Result<(), StoreError> {
        self.patch(
            "meetings",
            &[("id", format!("eq.{meeting_id}"))],
            json!({ "completed": true }),
        )
        .await
    }

    async fn note(&self, meeting_id: &str, author: &str) -> Result<Note, StoreError> {
        self.select_one(
            "meeting_notes",
            &[
                ("meetingId", format!("eq.{meeting_id}")),
                ("createdBy", format!("eq.{author}")),
            ],
        )
        .await
    }

    async fn create_note(&self, note: &Note) -> Result<Note, StoreError> {
        self.insert_returning("meeting_notes", note).await
    }

    async fn update_note(&self, note_id: &str, content: &str) -> Result<(), StoreError> {
        self.patch(
            "meeting_notes",
            &[("id", format!("eq.{note_id}"))],
            json!({ "content": content }),
        )
        .await
    }

    async fn questions(&self, meeting_id: &str) -> Result<Vec<Question>, StoreError> {
        self.select(
            "meeting_questions",
            &[
                ("meetingId", format!("eq.{meeting_id}")),
                ("order", "createdAt.desc".to_string()),
            ],
        )
        .await
    }

    async fn create_question(&self, question: &Question) -> Result<(), StoreError> {
        self.insert("meeting_questions", question).await
    }

    async fn set_question_upvotes(
        &self,
        question_id: &str,
        upvotes: &[String],
    ) -> Result<(), StoreError> {
        self.patch(
            "meeting_questions",
            &[("id", format!("eq.{question_id}"))],
            json!({ "upvotes": upvotes }),
        )
        .await
    }

    async fn set_question_answered(
        &self,
        question_id: &str,
        answered: bool,
    ) -> Result<(), StoreError> {
        self.patch(
            "meeting_questions",
            &[("id", format!("eq.{question_id}"))],
            json!({ "answered": answered }),
        )
        .await
    }

    async fn registered_user(
        &self,
        email: &str,
    ) -> Result<Option<RegisteredUser>, StoreError> {
        let mut rows: Vec<RegisteredUser> = self
            .select("users", &[("email", format!("eq.{email}"))])
            .await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }
}
