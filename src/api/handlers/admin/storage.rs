//! SQL storage helpers for students, courses, and enrollments.
//!
//! Handlers only validate input; this module owns the queries, the response
//! shaping, and the mapping of constraint violations to HTTP outcomes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{error, Instrument};

use super::types::{CourseResponse, EnrollmentResponse, StatsResponse, StudentResponse};
use crate::api::handlers::{
    auth::{is_foreign_key_violation, is_unique_violation, types::ErrorResponse},
    db_span,
};

#[derive(Debug)]
pub(crate) enum AdminError {
    BadRequest(&'static str),
    NotFound(&'static str),
    Conflict(&'static str),
    Database(sqlx::Error),
    Internal(anyhow::Error),
}

impl IntoResponse for AdminError {
    /// Database and internal failures are logged and surfaced as a generic `500`.
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Conflict(message) => (StatusCode::CONFLICT, message),
            Self::Database(err) => {
                error!("Database error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::Internal(err) => {
                error!("Internal error: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

fn conflict_or_database(err: sqlx::Error, conflict: &'static str) -> AdminError {
    if is_unique_violation(&err) {
        AdminError::Conflict(conflict)
    } else {
        AdminError::Database(err)
    }
}

/// Validated student fields ready to be written.
pub(super) struct StudentInput<'a> {
    pub(super) name: &'a str,
    pub(super) email: Option<&'a str>,
    pub(super) dob: Option<&'a str>,
}

/// Validated course fields ready to be written.
pub(super) struct CourseInput<'a> {
    pub(super) code: &'a str,
    pub(super) title: &'a str,
    pub(super) description: Option<&'a str>,
}

fn student_from_row(row: &PgRow) -> StudentResponse {
    StudentResponse {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        dob: row.get("dob"),
        created_at: row.get("created_at"),
    }
}

fn course_from_row(row: &PgRow) -> CourseResponse {
    CourseResponse {
        id: row.get("id"),
        code: row.get("code"),
        title: row.get("title"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

fn enrollment_from_row(row: &PgRow) -> EnrollmentResponse {
    EnrollmentResponse {
        id: row.get("id"),
        student_id: row.get("student_id"),
        course_id: row.get("course_id"),
        student_name: row.get("student_name"),
        course_code: row.get("course_code"),
        course_title: row.get("course_title"),
        created_at: row.get("created_at"),
    }
}

pub(super) async fn fetch_stats(pool: &PgPool) -> Result<StatsResponse, AdminError> {
    let query = r"
        SELECT
            (SELECT COUNT(*) FROM students) AS students,
            (SELECT COUNT(*) FROM courses) AS courses,
            (SELECT COUNT(*) FROM enrollments) AS enrollments
    ";
    let row = sqlx::query(query)
        .fetch_one(pool)
        .instrument(db_span("SELECT", query))
        .await
        .map_err(AdminError::Database)?;
    Ok(StatsResponse {
        students: row.get("students"),
        courses: row.get("courses"),
        enrollments: row.get("enrollments"),
    })
}

pub(super) async fn list_students(pool: &PgPool) -> Result<Vec<StudentResponse>, AdminError> {
    let query = r#"
        SELECT id, name, email,
            to_char(dob, 'YYYY-MM-DD') AS dob,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM students
        ORDER BY created_at DESC, id DESC
    "#;
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(db_span("SELECT", query))
        .await
        .map_err(AdminError::Database)?;
    Ok(rows.iter().map(student_from_row).collect())
}

/// Insert a student and, when `password_hash` is given, its `student` login in
/// the same transaction.
pub(super) async fn create_student(
    pool: &PgPool,
    student: &StudentInput<'_>,
    password_hash: Option<String>,
) -> Result<StudentResponse, AdminError> {
    let mut tx = pool.begin().await.map_err(AdminError::Database)?;

    let query = r#"
        INSERT INTO students (name, email, dob)
        VALUES ($1, $2, $3::date)
        RETURNING id, name, email,
            to_char(dob, 'YYYY-MM-DD') AS dob,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let row = sqlx::query(query)
        .bind(student.name)
        .bind(student.email)
        .bind(student.dob)
        .fetch_one(&mut *tx)
        .instrument(db_span("INSERT", query))
        .await
        .map_err(|err| conflict_or_database(err, "A student with this email already exists"))?;
    let created = student_from_row(&row);

    if let (Some(email), Some(password_hash)) = (student.email, password_hash) {
        let query = r"
            INSERT INTO users (email, password_hash, role, student_id)
            VALUES ($1, $2, 'student', $3)
        ";
        sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .bind(created.id)
            .execute(&mut *tx)
            .instrument(db_span("INSERT", query))
            .await
            .map_err(|err| conflict_or_database(err, "A login with this email already exists"))?;
    }

    tx.commit().await.map_err(AdminError::Database)?;
    Ok(created)
}

pub(super) async fn update_student(
    pool: &PgPool,
    id: i64,
    student: &StudentInput<'_>,
) -> Result<Option<StudentResponse>, AdminError> {
    let query = r#"
        UPDATE students
        SET name = $2, email = $3, dob = $4::date
        WHERE id = $1
        RETURNING id, name, email,
            to_char(dob, 'YYYY-MM-DD') AS dob,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let row = sqlx::query(query)
        .bind(id)
        .bind(student.name)
        .bind(student.email)
        .bind(student.dob)
        .fetch_optional(pool)
        .instrument(db_span("UPDATE", query))
        .await
        .map_err(|err| conflict_or_database(err, "A student with this email already exists"))?;
    Ok(row.as_ref().map(student_from_row))
}

/// Delete a student. Enrollments, the linked login, and its sessions cascade.
pub(super) async fn delete_student(pool: &PgPool, id: i64) -> Result<bool, AdminError> {
    let query = "DELETE FROM students WHERE id = $1";
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(db_span("DELETE", query))
        .await
        .map_err(AdminError::Database)?;
    Ok(result.rows_affected() > 0)
}

pub(super) async fn list_courses(pool: &PgPool) -> Result<Vec<CourseResponse>, AdminError> {
    let query = r#"
        SELECT id, code, title, description,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM courses
        ORDER BY created_at DESC, id DESC
    "#;
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(db_span("SELECT", query))
        .await
        .map_err(AdminError::Database)?;
    Ok(rows.iter().map(course_from_row).collect())
}

pub(super) async fn create_course(
    pool: &PgPool,
    course: &CourseInput<'_>,
) -> Result<CourseResponse, AdminError> {
    let query = r#"
        INSERT INTO courses (code, title, description)
        VALUES ($1, $2, $3)
        RETURNING id, code, title, description,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let row = sqlx::query(query)
        .bind(course.code)
        .bind(course.title)
        .bind(course.description)
        .fetch_one(pool)
        .instrument(db_span("INSERT", query))
        .await
        .map_err(|err| conflict_or_database(err, "A course with this code already exists"))?;
    Ok(course_from_row(&row))
}

pub(super) async fn update_course(
    pool: &PgPool,
    id: i64,
    course: &CourseInput<'_>,
) -> Result<Option<CourseResponse>, AdminError> {
    let query = r#"
        UPDATE courses
        SET code = $2, title = $3, description = $4
        WHERE id = $1
        RETURNING id, code, title, description,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let row = sqlx::query(query)
        .bind(id)
        .bind(course.code)
        .bind(course.title)
        .bind(course.description)
        .fetch_optional(pool)
        .instrument(db_span("UPDATE", query))
        .await
        .map_err(|err| conflict_or_database(err, "A course with this code already exists"))?;
    Ok(row.as_ref().map(course_from_row))
}

pub(super) async fn delete_course(pool: &PgPool, id: i64) -> Result<bool, AdminError> {
    let query = "DELETE FROM courses WHERE id = $1";
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(db_span("DELETE", query))
        .await
        .map_err(AdminError::Database)?;
    Ok(result.rows_affected() > 0)
}

pub(super) async fn list_enrollments(
    pool: &PgPool,
) -> Result<Vec<EnrollmentResponse>, AdminError> {
    let query = r#"
        SELECT e.id, e.student_id, e.course_id,
            s.name AS student_name,
            c.code AS course_code,
            c.title AS course_title,
            to_char(e.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM enrollments e
        JOIN students s ON s.id = e.student_id
        JOIN courses c ON c.id = e.course_id
        ORDER BY e.created_at DESC, e.id DESC
    "#;
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(db_span("SELECT", query))
        .await
        .map_err(AdminError::Database)?;
    Ok(rows.iter().map(enrollment_from_row).collect())
}

pub(super) async fn create_enrollment(
    pool: &PgPool,
    student_id: i64,
    course_id: i64,
) -> Result<EnrollmentResponse, AdminError> {
    let query = r#"
        WITH inserted AS (
            INSERT INTO enrollments (student_id, course_id)
            VALUES ($1, $2)
            RETURNING id, student_id, course_id, created_at
        )
        SELECT i.id, i.student_id, i.course_id,
            s.name AS student_name,
            c.code AS course_code,
            c.title AS course_title,
            to_char(i.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM inserted i
        JOIN students s ON s.id = i.student_id
        JOIN courses c ON c.id = i.course_id
    "#;
    let row = sqlx::query(query)
        .bind(student_id)
        .bind(course_id)
        .fetch_one(pool)
        .instrument(db_span("INSERT", query))
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                AdminError::NotFound("Student or course not found")
            } else {
                conflict_or_database(err, "Student is already enrolled in this course")
            }
        })?;
    Ok(enrollment_from_row(&row))
}

pub(super) async fn delete_enrollment(pool: &PgPool, id: i64) -> Result<bool, AdminError> {
    let query = "DELETE FROM enrollments WHERE id = $1";
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(db_span("DELETE", query))
        .await
        .map_err(AdminError::Database)?;
    Ok(result.rows_affected() > 0)
}
