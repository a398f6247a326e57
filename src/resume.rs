//! Typed structured resume data.
//!
//! These types are what a successful parse deserialises into. Optional
//! scalars are `Option`, lists default to empty, and enumerated vocabularies
//! are Rust enums so downstream code can match on them. The accepted shape
//! is described once more, declaratively, in [`crate::schema`]; that table
//! drives the prompt and the error messages, these types drive the API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    /// State or province.
    pub region: Option<String>,
    pub country: Option<String>,
    /// ISO 3166-1 alpha-2.
    pub country_code: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceLocation {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub remote: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationLocation {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlType {
    Website,
    Linkedin,
    Github,
    Portfolio,
    Blog,
    Twitter,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUrl {
    #[serde(rename = "type")]
    pub url_type: Option<UrlType>,
    pub url: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub name: String,
    /// Professional title or tagline.
    pub label: Option<String>,
    pub image: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<Location>,
    #[serde(default)]
    pub urls: Vec<ProfileUrl>,
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Freelance,
    Internship,
    Volunteer,
    Apprenticeship,
    SelfEmployed,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    #[serde(rename = "type")]
    pub employment_type: Option<EmploymentType>,
    pub company: String,
    pub title: String,
    pub location: Option<ExperienceLocation>,
    /// Kept verbatim, e.g. "Jan 2023".
    pub start_date: String,
    /// `None` while the position is held.
    pub end_date: Option<String>,
    pub current: Option<bool>,
    pub description: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gpa {
    pub value: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub location: Option<EducationLocation>,
    pub start_date: Option<String>,
    pub graduation_date: Option<String>,
    pub gpa: Option<Gpa>,
    pub honors: Option<String>,
    #[serde(default)]
    pub courses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillType {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proficiency {
    Basic,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Exact,
    Alias,
    Embedding,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Skill name as written in the resume.
    pub skill: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub skill_type: Option<SkillType>,
    pub proficiency: Option<Proficiency>,
    pub years_experience: Option<f64>,
    pub last_used: Option<String>,

    // Taxonomy-matching fields; models normally leave these null.
    pub normalized: Option<String>,
    pub skill_id: Option<i64>,
    pub proficiency_score: Option<f64>,
    pub confidence: Option<f64>,
    pub match_method: Option<MatchMethod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub name: String,
    pub issuer: Option<String>,
    pub date: Option<String>,
    pub expiration_date: Option<String>,
    pub credential_id: Option<String>,
    pub url: Option<String>,
}

/// ILR scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LanguageProficiency {
    Elementary,
    LimitedWorking,
    ProfessionalWorking,
    FullProfessional,
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fluency {
    Basic,
    Conversational,
    Fluent,
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub language: String,
    pub proficiency: Option<LanguageProficiency>,
    pub fluency: Option<Fluency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub description: Option<String>,
    pub role: Option<String>,
    pub url: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub title: String,
    pub awarder: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A parsed resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeData {
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub certifications: Vec<Certification>,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub awards: Vec<Award>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
}
