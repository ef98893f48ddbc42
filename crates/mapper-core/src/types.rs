//! FHIR primitive type vocabulary.
//!
//! The `dataType` a field mapping may declare is restricted to the FHIR R4
//! primitive types, and declared types must be compatible with the type the
//! FHIR structure definition expects at the mapped element.

/// FHIR primitive types allowed in a field mapping's `dataType`.
pub const FHIR_PRIMITIVES: &[&str] = &[
    "string",
    "integer",
    "decimal",
    "boolean",
    "date",
    "dateTime",
    "time",
    "instant",
    "code",
    "uri",
    "url",
    "canonical",
    "oid",
    "uuid",
    "id",
    "markdown",
    "base64Binary",
    "unsignedInt",
    "positiveInt",
];

/// Whether `name` is a FHIR primitive type.
pub fn is_fhir_primitive(name: &str) -> bool {
    FHIR_PRIMITIVES.contains(&name)
}

/// Whether a declared mapping type may target a FHIR element of
/// `fhir_type`. An exact match is always compatible; beyond that a fixed
/// widening table applies (e.g. `string` may feed any string-shaped
/// primitive, `date` may feed `dateTime`).
pub fn is_compatible(declared: &str, fhir_type: &str) -> bool {
    if declared == fhir_type {
        return true;
    }
    let accepted: &[&str] = match declared {
        "string" => &[
            "string",
            "markdown",
            "id",
            "code",
            "uri",
            "url",
            "canonical",
            "oid",
            "uuid",
        ],
        "integer" => &["integer", "unsignedInt", "positiveInt"],
        "decimal" => &["decimal"],
        "boolean" => &["boolean"],
        "date" => &["date", "dateTime", "instant"],
        "dateTime" => &["dateTime", "instant"],
        "code" => &["code", "string"],
        _ => return false,
    };
    accepted.contains(&fhir_type)
}
