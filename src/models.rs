use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::err::Error;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
    Graduated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub enrollment_date: String,
    pub major: Option<String>,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a create request. Only the keys the client sent are echoed back,
/// explicit `null`s included.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub date_of_birth: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub address: Option<Option<String>>,
    pub enrollment_date: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub major: Option<Option<String>>,
    pub status: Option<StudentStatus>,
}

impl NewStudent {
    /// Rejects the request unless `firstName`, `lastName` and `email` are present and non-empty.
    pub fn validate(&self) -> Result<(), Error> {
        for (field, value) in [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
        ] {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                return Err(Error::bad_request(format!("`{}` is required", field)));
            }
        }
        Ok(())
    }
}

/// Body of an update request.
///
/// A field changes only when its key is present. Nullable fields use a double
/// option so that `null` clears the stored value while an absent key keeps it.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub date_of_birth: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub address: Option<Option<String>>,
    pub enrollment_date: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub major: Option<Option<String>>,
    pub status: Option<StudentStatus>,
}

impl StudentPatch {
    /// Writes every submitted field onto `student`. Leaves `updated_at` alone.
    pub fn apply(&self, student: &mut Student) -> Result<(), Error> {
        overwrite_required("firstName", &self.first_name, &mut student.first_name)?;
        overwrite_required("lastName", &self.last_name, &mut student.last_name)?;
        overwrite_required("email", &self.email, &mut student.email)?;
        overwrite_required(
            "enrollmentDate",
            &self.enrollment_date,
            &mut student.enrollment_date,
        )?;
        overwrite_optional(&self.phone, &mut student.phone);
        overwrite_optional(&self.date_of_birth, &mut student.date_of_birth);
        overwrite_optional(&self.address, &mut student.address);
        overwrite_optional(&self.major, &mut student.major);
        if let Some(status) = self.status {
            student.status = status;
        }
        Ok(())
    }
}

fn overwrite_required(
    field: &'static str,
    value: &Option<String>,
    target: &mut String,
) -> Result<(), Error> {
    if let Some(value) = value {
        if value.trim().is_empty() {
            return Err(Error::bad_request(format!("`{}` cannot be empty", field)));
        }
        *target = value.clone();
    }
    Ok(())
}

fn overwrite_optional(value: &Option<Option<String>>, target: &mut Option<String>) {
    if let Some(value) = value {
        *target = blank_to_none(value.as_deref());
    }
}

/// Empty strings in nullable columns are stored as NULL.
pub fn blank_to_none(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Column value for a nullable field: absent, `null` and `""` all store NULL.
pub fn nullable(value: &Option<Option<String>>) -> Option<String> {
    blank_to_none(value.as_ref().and_then(|v| v.as_deref()))
}

/// Response for create and update: the id plus whatever fields the client sent.
#[derive(Debug, Clone, Serialize)]
pub struct StudentEcho<T> {
    pub id: i64,
    #[serde(flatten)]
    pub fields: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn student() -> Student {
        let now = Utc::now();
        Student {
            id: 1,
            first_name: "John".into(),
            last_name: "Doe".into(),
            email: "john.doe@example.com".into(),
            phone: Some("1234567890".into()),
            date_of_birth: None,
            address: Some("1 Main St".into()),
            enrollment_date: "2024-09-01".into(),
            major: Some("Computer Science".into()),
            status: StudentStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn patch_only_touches_present_keys() {
        let patch: StudentPatch =
            serde_json::from_value(json!({"firstName": "Jonathan", "major": "Data Science"}))
                .unwrap();
        let mut updated = student();
        patch.apply(&mut updated).unwrap();

        let original = student();
        assert_eq!(updated.first_name, "Jonathan");
        assert_eq!(updated.major.as_deref(), Some("Data Science"));
        assert_eq!(updated.last_name, original.last_name);
        assert_eq!(updated.email, original.email);
        assert_eq!(updated.phone, original.phone);
        assert_eq!(updated.address, original.address);
        assert_eq!(updated.status, StudentStatus::Active);
    }

    #[test]
    fn patch_clears_optional_fields_with_null_or_empty() {
        let patch: StudentPatch =
            serde_json::from_value(json!({"phone": null, "address": ""})).unwrap();
        let mut updated = student();
        patch.apply(&mut updated).unwrap();
        assert_eq!(updated.phone, None);
        assert_eq!(updated.address, None);
        assert_eq!(updated.major.as_deref(), Some("Computer Science"));
    }

    #[test]
    fn patch_rejects_blank_required_field() {
        let patch: StudentPatch = serde_json::from_value(json!({"lastName": ""})).unwrap();
        let mut updated = student();
        let err = patch.apply(&mut updated).unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        assert_eq!(updated.last_name, "Doe");
    }

    #[test]
    fn patch_echo_keeps_explicit_nulls() {
        let patch: StudentPatch =
            serde_json::from_value(json!({"phone": null, "status": "graduated"})).unwrap();
        let echoed = serde_json::to_value(StudentEcho { id: 4, fields: patch }).unwrap();
        assert_eq!(echoed, json!({"id": 4, "phone": null, "status": "graduated"}));
    }

    #[test]
    fn new_student_requires_names_and_email() {
        let missing: NewStudent =
            serde_json::from_value(json!({"firstName": "Jane", "email": "j@x.io"})).unwrap();
        assert!(missing.validate().is_err());

        let blank: NewStudent = serde_json::from_value(
            json!({"firstName": "Jane", "lastName": " ", "email": "j@x.io"}),
        )
        .unwrap();
        assert!(blank.validate().is_err());

        let ok: NewStudent = serde_json::from_value(
            json!({"firstName": "Jane", "lastName": "Smith", "email": "j@x.io"}),
        )
        .unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn new_student_echo_keeps_explicit_nulls() {
        let body: NewStudent = serde_json::from_value(json!({
            "firstName": "Jane",
            "lastName": "Smith",
            "email": "j@x.io",
            "phone": null
        }))
        .unwrap();
        assert_eq!(body.phone, Some(None));
        assert_eq!(body.address, None);
        assert_eq!(nullable(&body.phone), None);

        let echoed = serde_json::to_value(StudentEcho { id: 7, fields: body }).unwrap();
        assert_eq!(
            echoed,
            json!({
                "id": 7,
                "firstName": "Jane",
                "lastName": "Smith",
                "email": "j@x.io",
                "phone": null
            })
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        let parsed = serde_json::from_value::<NewStudent>(json!({"status": "expelled"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn user_never_serializes_password_hash() {
        let user = User {
            id: 1,
            username: "admin".into(),
            password_hash: "$pbkdf2-sha256$secret".into(),
            email: "admin@example.com".into(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
    }
}
