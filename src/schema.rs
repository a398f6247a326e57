//! Declarative description of the resume shape.
//!
//! One table drives two consumers: [`resume_json_schema`] renders it as the
//! JSON Schema embedded in the extraction prompt, and
//! [`crate::validate`] walks model output against it to produce
//! `path: message` errors. The typed mirror lives in [`crate::resume`].

use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

/// Element type of a list field.
#[derive(Debug, Clone, Copy)]
pub enum ItemType {
    String,
    Object(&'static ObjectSchema),
}

/// Type of a single field.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    String,
    Number { min: Option<f64>, max: Option<f64> },
    Integer,
    Boolean,
    Enum(&'static [&'static str]),
    Object(&'static ObjectSchema),
    Array(ItemType),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    /// Must be present.
    pub required: bool,
    /// `null` is accepted.
    pub nullable: bool,
    pub description: Option<&'static str>,
}

impl Field {
    /// Required, non-null.
    const fn req(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
            nullable: false,
            description: None,
        }
    }

    /// Optional, nullable.
    const fn opt(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            nullable: true,
            description: None,
        }
    }

    /// Optional list defaulting to empty; `null` is rejected.
    const fn list(name: &'static str, item: ItemType) -> Self {
        Self {
            name,
            ty: FieldType::Array(item),
            required: false,
            nullable: false,
            description: None,
        }
    }

    const fn describe(mut self, text: &'static str) -> Self {
        self.description = Some(text);
        self
    }
}

#[derive(Debug)]
pub struct ObjectSchema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

use FieldType::{Boolean, Integer, String as Str};

const UNIT_INTERVAL: FieldType = FieldType::Number {
    min: Some(0.0),
    max: Some(1.0),
};
const NUMBER: FieldType = FieldType::Number {
    min: None,
    max: None,
};

pub const URL_TYPES: &[&str] = &[
    "website", "linkedin", "github", "portfolio", "blog", "twitter", "other",
];
pub const EMPLOYMENT_TYPES: &[&str] = &[
    "full-time",
    "part-time",
    "contract",
    "freelance",
    "internship",
    "volunteer",
    "apprenticeship",
    "self-employed",
    "other",
];
pub const SKILL_TYPES: &[&str] = &["hard", "soft"];
pub const PROFICIENCIES: &[&str] = &["basic", "intermediate", "advanced", "expert"];
pub const MATCH_METHODS: &[&str] = &["exact", "alias", "embedding", "none"];
pub const LANGUAGE_PROFICIENCIES: &[&str] = &[
    "elementary",
    "limited-working",
    "professional-working",
    "full-professional",
    "native",
];
pub const FLUENCIES: &[&str] = &["basic", "conversational", "fluent", "native"];

pub static LOCATION: ObjectSchema = ObjectSchema {
    name: "Location",
    fields: &[
        Field::opt("city", Str),
        Field::opt("region", Str).describe("State or province"),
        Field::opt("country", Str),
        Field::opt("country_code", Str).describe("ISO 3166-1 alpha-2"),
        Field::opt("postal_code", Str),
        Field::opt("address", Str).describe("Full street address"),
    ],
};

pub static EXPERIENCE_LOCATION: ObjectSchema = ObjectSchema {
    name: "ExperienceLocation",
    fields: &[
        Field::opt("city", Str),
        Field::opt("region", Str),
        Field::opt("country", Str),
        Field::opt("remote", Boolean),
    ],
};

pub static EDUCATION_LOCATION: ObjectSchema = ObjectSchema {
    name: "EducationLocation",
    fields: &[
        Field::opt("city", Str),
        Field::opt("region", Str),
        Field::opt("country", Str),
    ],
};

pub static PROFILE_URL: ObjectSchema = ObjectSchema {
    name: "ProfileUrl",
    fields: &[
        Field::opt("type", FieldType::Enum(URL_TYPES)),
        Field::req("url", Str),
        Field::opt("label", Str),
    ],
};

pub static PERSONAL_INFO: ObjectSchema = ObjectSchema {
    name: "PersonalInfo",
    fields: &[
        Field::req("name", Str),
        Field::opt("label", Str).describe("Professional title or tagline"),
        Field::opt("image", Str).describe("URL to profile photo"),
        Field::opt("email", Str),
        Field::opt("phone", Str),
        Field::opt("location", FieldType::Object(&LOCATION)),
        Field::list("urls", ItemType::Object(&PROFILE_URL)),
        Field::opt("date_of_birth", Str).describe("ISO 8601 (YYYY-MM-DD)"),
    ],
};

pub static EXPERIENCE: ObjectSchema = ObjectSchema {
    name: "Experience",
    fields: &[
        Field::opt("type", FieldType::Enum(EMPLOYMENT_TYPES)),
        Field::req("company", Str),
        Field::req("title", Str),
        Field::opt("location", FieldType::Object(&EXPERIENCE_LOCATION)),
        Field::req("start_date", Str),
        Field::opt("end_date", Str).describe("null while the position is held"),
        Field::opt("current", Boolean),
        Field::opt("description", Str),
        Field::list("highlights", ItemType::String),
    ],
};

pub static GPA: ObjectSchema = ObjectSchema {
    name: "GPA",
    fields: &[Field::req("value", NUMBER), Field::req("max", NUMBER)],
};

pub static EDUCATION: ObjectSchema = ObjectSchema {
    name: "Education",
    fields: &[
        Field::req("institution", Str),
        Field::opt("degree", Str),
        Field::opt("field_of_study", Str),
        Field::opt("location", FieldType::Object(&EDUCATION_LOCATION)),
        Field::opt("start_date", Str),
        Field::opt("graduation_date", Str),
        Field::opt("gpa", FieldType::Object(&GPA)),
        Field::opt("honors", Str).describe("e.g. cum laude, Dean's List"),
        Field::list("courses", ItemType::String),
    ],
};

pub static SKILL: ObjectSchema = ObjectSchema {
    name: "Skill",
    fields: &[
        Field::req("skill", Str).describe("Skill name as written in the resume"),
        Field::opt("category", Str).describe("e.g. Programming Languages"),
        Field::opt("subcategory", Str),
        Field::opt("skill_type", FieldType::Enum(SKILL_TYPES)),
        Field::opt("proficiency", FieldType::Enum(PROFICIENCIES)),
        Field::opt("years_experience", NUMBER),
        Field::opt("last_used", Str).describe("YYYY-MM-DD or YYYY-MM"),
        Field::opt("normalized", Str),
        Field::opt("skill_id", Integer),
        Field::opt("proficiency_score", UNIT_INTERVAL),
        Field::opt("confidence", UNIT_INTERVAL),
        Field::opt("match_method", FieldType::Enum(MATCH_METHODS)),
    ],
};

pub static CERTIFICATION: ObjectSchema = ObjectSchema {
    name: "Certification",
    fields: &[
        Field::req("name", Str),
        Field::opt("issuer", Str),
        Field::opt("date", Str),
        Field::opt("expiration_date", Str),
        Field::opt("credential_id", Str),
        Field::opt("url", Str),
    ],
};

pub static LANGUAGE: ObjectSchema = ObjectSchema {
    name: "Language",
    fields: &[
        Field::req("language", Str),
        Field::opt("proficiency", FieldType::Enum(LANGUAGE_PROFICIENCIES)).describe("ILR scale"),
        Field::opt("fluency", FieldType::Enum(FLUENCIES)),
    ],
};

pub static PROJECT: ObjectSchema = ObjectSchema {
    name: "Project",
    fields: &[
        Field::req("name", Str),
        Field::opt("description", Str),
        Field::opt("role", Str),
        Field::opt("url", Str),
        Field::opt("start_date", Str),
        Field::opt("end_date", Str),
        Field::list("technologies", ItemType::String),
        Field::list("highlights", ItemType::String),
    ],
};

pub static AWARD: ObjectSchema = ObjectSchema {
    name: "Award",
    fields: &[
        Field::req("title", Str),
        Field::opt("awarder", Str),
        Field::opt("date", Str),
        Field::opt("description", Str),
    ],
};

pub static PUBLICATION: ObjectSchema = ObjectSchema {
    name: "Publication",
    fields: &[
        Field::req("title", Str),
        Field::opt("publisher", Str),
        Field::opt("publication_date", Str),
        Field::opt("url", Str),
        Field::list("authors", ItemType::String),
        Field::opt("description", Str),
    ],
};

pub static REFERENCE: ObjectSchema = ObjectSchema {
    name: "Reference",
    fields: &[
        Field::opt("name", Str),
        Field::opt("relationship", Str).describe("e.g. Manager, Colleague"),
        Field::opt("company", Str),
        Field::opt("email", Str),
        Field::opt("phone", Str),
    ],
};

/// Root of the resume shape.
pub static RESUME_DATA: ObjectSchema = ObjectSchema {
    name: "ResumeData",
    fields: &[
        Field::req("personal_info", FieldType::Object(&PERSONAL_INFO)),
        Field::list("experience", ItemType::Object(&EXPERIENCE)),
        Field::list("education", ItemType::Object(&EDUCATION)),
        Field::list("skills", ItemType::Object(&SKILL)),
        Field::list("certifications", ItemType::Object(&CERTIFICATION)),
        Field::list("languages", ItemType::Object(&LANGUAGE)),
        Field::list("projects", ItemType::Object(&PROJECT)),
        Field::list("awards", ItemType::Object(&AWARD)),
        Field::list("publications", ItemType::Object(&PUBLICATION)),
        Field::list("interests", ItemType::String),
        Field::list("references", ItemType::Object(&REFERENCE)),
    ],
};

static RESUME_JSON_SCHEMA: Lazy<String> = Lazy::new(|| {
    serde_json::to_string_pretty(&object_schema(&RESUME_DATA)).unwrap_or_default()
});

/// The resume JSON Schema, pretty-printed for prompt embedding.
pub fn resume_json_schema() -> &'static str {
    &RESUME_JSON_SCHEMA
}

fn object_schema(schema: &ObjectSchema) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in schema.fields {
        let mut prop = type_schema(field.ty);
        if field.nullable {
            prop = json!({ "anyOf": [prop, { "type": "null" }], "default": null });
        } else if matches!(field.ty, FieldType::Array(_)) && !field.required {
            if let Value::Object(map) = &mut prop {
                map.insert("default".into(), json!([]));
            }
        }
        if let (Some(desc), Value::Object(map)) = (field.description, &mut prop) {
            map.insert("description".into(), Value::String(desc.into()));
        }
        if field.required {
            required.push(Value::String(field.name.into()));
        }
        properties.insert(field.name.into(), prop);
    }

    let mut out = json!({
        "title": schema.name,
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        out["required"] = Value::Array(required);
    }
    out
}

fn type_schema(ty: FieldType) -> Value {
    match ty {
        FieldType::String => json!({ "type": "string" }),
        FieldType::Number { min, max } => {
            let mut v = json!({ "type": "number" });
            if let Some(min) = min {
                v["minimum"] = json!(min);
            }
            if let Some(max) = max {
                v["maximum"] = json!(max);
            }
            v
        }
        FieldType::Integer => json!({ "type": "integer" }),
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Enum(values) => json!({ "type": "string", "enum": values }),
        FieldType::Object(schema) => object_schema(schema),
        FieldType::Array(ItemType::String) => {
            json!({ "type": "array", "items": { "type": "string" } })
        }
        FieldType::Array(ItemType::Object(schema)) => {
            json!({ "type": "array", "items": object_schema(schema) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume;

    #[test]
    fn root_requires_personal_info_only() {
        let schema: Value = serde_json::from_str(resume_json_schema()).unwrap();
        assert_eq!(schema["title"], "ResumeData");
        assert_eq!(schema["required"], json!(["personal_info"]));
        assert_eq!(
            schema["properties"]["personal_info"]["required"],
            json!(["name"])
        );
    }

    #[test]
    fn nullable_fields_use_any_of() {
        let schema: Value = serde_json::from_str(resume_json_schema()).unwrap();
        let email = &schema["properties"]["personal_info"]["properties"]["email"];
        assert_eq!(email["anyOf"][1]["type"], "null");
    }

    #[test]
    fn bounds_and_enums_rendered() {
        let skill = object_schema(&SKILL);
        let conf = &skill["properties"]["confidence"]["anyOf"][0];
        assert_eq!(conf["minimum"], 0.0);
        assert_eq!(conf["maximum"], 1.0);
        let kind = &skill["properties"]["skill_type"]["anyOf"][0];
        assert_eq!(kind["enum"], json!(["hard", "soft"]));
    }

    #[test]
    fn lists_default_to_empty() {
        let schema = object_schema(&RESUME_DATA);
        assert_eq!(schema["properties"]["skills"]["default"], json!([]));
        assert_eq!(schema["properties"]["skills"]["type"], "array");
    }

    fn accepts<T: serde::de::DeserializeOwned>(values: &[&str]) {
        for v in values {
            serde_json::from_value::<T>(Value::String((*v).into()))
                .unwrap_or_else(|e| panic!("{v}: {e}"));
        }
    }

    #[test]
    fn vocabularies_match_typed_enums() {
        accepts::<resume::UrlType>(URL_TYPES);
        accepts::<resume::EmploymentType>(EMPLOYMENT_TYPES);
        accepts::<resume::SkillType>(SKILL_TYPES);
        accepts::<resume::Proficiency>(PROFICIENCIES);
        accepts::<resume::MatchMethod>(MATCH_METHODS);
        accepts::<resume::LanguageProficiency>(LANGUAGE_PROFICIENCIES);
        accepts::<resume::Fluency>(FLUENCIES);
    }
}
