//! Handlers for the `/api/students` resource. Every route requires a session.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::{Extension, Json};
use chrono::Utc;

use crate::auth::Authenticated;
use crate::models::{Message, NewStudent, Student, StudentEcho, StudentPatch};
use crate::{breaks, creates, proceeds, AppContext, Created, Error, Payload};

fn student_not_found() -> Error {
    Error::not_found("Student not found")
}

pub async fn list_students(
    _: Authenticated,
    Extension(ctx): Extension<AppContext>,
) -> Payload<Vec<Student>> {
    proceeds(ctx.store.list_students().await?)
}

pub async fn read_student(
    _: Authenticated,
    Extension(ctx): Extension<AppContext>,
    id: Result<Path<i64>, PathRejection>,
) -> Payload<Student> {
    let Path(id) = id?;
    match ctx.store.find_student(id).await? {
        Some(student) => proceeds(student),
        None => breaks(student_not_found()),
    }
}

pub async fn create_student(
    Authenticated(claims): Authenticated,
    Extension(ctx): Extension<AppContext>,
    payload: Result<Json<NewStudent>, JsonRejection>,
) -> Created<StudentEcho<NewStudent>> {
    let Json(student) = payload?;
    let id = ctx.store.insert_student(&student, Utc::now()).await?;
    log::info!("User `{}` created student {}", claims.username, id);
    creates(StudentEcho {
        id,
        fields: student,
    })
}

pub async fn update_student(
    Authenticated(claims): Authenticated,
    Extension(ctx): Extension<AppContext>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StudentPatch>, JsonRejection>,
) -> Payload<StudentEcho<StudentPatch>> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    if ctx
        .store
        .update_student(id, &patch, Utc::now())
        .await?
        .is_none()
    {
        return breaks(student_not_found());
    }
    log::info!("User `{}` updated student {}", claims.username, id);
    proceeds(StudentEcho { id, fields: patch })
}

pub async fn delete_student(
    Authenticated(claims): Authenticated,
    Extension(ctx): Extension<AppContext>,
    id: Result<Path<i64>, PathRejection>,
) -> Payload<Message> {
    let Path(id) = id?;
    if !ctx.store.delete_student(id).await? {
        return breaks(student_not_found());
    }
    log::info!("User `{}` deleted student {}", claims.username, id);
    proceeds(Message::new("Student deleted successfully"))
}
