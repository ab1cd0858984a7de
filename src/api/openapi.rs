use super::handlers::{
    admin::{courses, enrollments, stats, students, types as admin_types},
    auth::{self, session, types as auth_types},
    health, me,
};
use utoipa::{
    openapi::{Contact, Info, InfoBuilder, License},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        session::login,
        session::logout,
        session::me,
        stats::stats,
        students::list_students,
        students::create_student,
        students::update_student,
        students::delete_student,
        courses::list_courses,
        courses::create_course,
        courses::update_course,
        courses::delete_course,
        enrollments::list_enrollments,
        enrollments::create_enrollment,
        enrollments::delete_enrollment,
        me::me,
        me::my_enrollments,
    ),
    components(schemas(
        health::Health,
        auth::Role,
        auth::SessionIdentity,
        auth_types::LoginRequest,
        auth_types::LoginResponse,
        auth_types::MessageResponse,
        auth_types::MeResponse,
        auth_types::ErrorResponse,
        admin_types::StudentRequest,
        admin_types::CourseRequest,
        admin_types::IdInput,
        admin_types::EnrollmentRequest,
        admin_types::StatsResponse,
        admin_types::StudentResponse,
        admin_types::CourseResponse,
        admin_types::EnrollmentResponse,
        me::Profile,
        me::ProfileResponse,
        me::MyEnrollment,
    )),
    tags(
        (name = "auth", description = "Session login, logout and identity"),
        (name = "admin", description = "Student, course and enrollment management"),
        (name = "student", description = "Own profile and enrollments"),
        (name = "health", description = "Liveness and database reachability"),
    )
)]
struct ApiDoc;

/// `OpenAPI` document for every served route, with info taken from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();
    spec.info = cargo_info();
    spec
}

fn cargo_info() -> Info {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.find('<') {
        Some(start) => {
            let name = author[..start].trim();
            let email = author[start + 1..].trim_end_matches('>').trim();
            (
                Some(name).filter(|v| !v.is_empty()),
                Some(email).filter(|v| !v.is_empty()),
            )
        }
        None => (Some(author.trim()).filter(|v| !v.is_empty()), None),
    }
}
