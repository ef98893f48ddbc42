//! FHIR structure catalog.
//!
//! The load-time validator checks that the FHIR side of every mapped path
//! starts at a real element of the target resource. That structural
//! knowledge comes from a [`StructureCatalog`]: an injected collaborator,
//! so deployments with custom profiles or additional resources can supply
//! their own. The built-in [`R4Catalog`] covers the common administrative
//! and clinical R4 resources with their top-level elements.

use std::collections::HashMap;
use std::fmt;

/// Structure definition of one resource type: its name and the FHIR type
/// of each top-level element.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    name: String,
    children: HashMap<String, String>,
}

impl ResourceDefinition {
    /// Build a definition from `(element name, FHIR type)` pairs.
    pub fn new(name: impl Into<String>, children: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            children: children
                .iter()
                .map(|(child, fhir_type)| (child.to_string(), fhir_type.to_string()))
                .collect(),
        }
    }

    /// The resource type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the resource has a top-level element `child`.
    pub fn has_child(&self, child: &str) -> bool {
        self.children.contains_key(child)
    }

    /// FHIR type name of a top-level element.
    pub fn child_type(&self, child: &str) -> Option<&str> {
        self.children.get(child).map(String::as_str)
    }
}

/// Resolves resource definitions for path validation.
pub trait StructureCatalog: fmt::Debug + Send + Sync {
    /// Look up a resource type by name.
    fn resource(&self, name: &str) -> Option<&ResourceDefinition>;

    /// FHIR type of `child` within `resource`.
    fn child_type_name<'a>(&self, resource: &'a ResourceDefinition, child: &str) -> Option<&'a str> {
        resource.child_type(child)
    }
}

/// Elements every resource inherits from Resource/DomainResource.
const BASE_ELEMENTS: &[(&str, &str)] = &[
    ("id", "id"),
    ("meta", "Meta"),
    ("implicitRules", "uri"),
    ("language", "code"),
    ("text", "Narrative"),
    ("contained", "Resource"),
    ("extension", "Extension"),
    ("modifierExtension", "Extension"),
];

const PATIENT: &[(&str, &str)] = &[
    ("identifier", "Identifier"),
    ("active", "boolean"),
    ("name", "HumanName"),
    ("telecom", "ContactPoint"),
    ("gender", "code"),
    ("birthDate", "date"),
    ("deceasedBoolean", "boolean"),
    ("deceasedDateTime", "dateTime"),
    ("address", "Address"),
    ("maritalStatus", "CodeableConcept"),
    ("multipleBirthBoolean", "boolean"),
    ("multipleBirthInteger", "integer"),
    ("photo", "Attachment"),
    ("contact", "BackboneElement"),
    ("communication", "BackboneElement"),
    ("generalPractitioner", "Reference"),
    ("managingOrganization", "Reference"),
    ("link", "BackboneElement"),
];

const PRACTITIONER: &[(&str, &str)] = &[
    ("identifier", "Identifier"),
    ("active", "boolean"),
    ("name", "HumanName"),
    ("telecom", "ContactPoint"),
    ("address", "Address"),
    ("gender", "code"),
    ("birthDate", "date"),
    ("photo", "Attachment"),
    ("qualification", "BackboneElement"),
    ("communication", "CodeableConcept"),
];

const ORGANIZATION: &[(&str, &str)] = &[
    ("identifier", "Identifier"),
    ("active", "boolean"),
    ("type", "CodeableConcept"),
    ("name", "string"),
    ("alias", "string"),
    ("telecom", "ContactPoint"),
    ("address", "Address"),
    ("partOf", "Reference"),
    ("contact", "BackboneElement"),
    ("endpoint", "Reference"),
];

const ENCOUNTER: &[(&str, &str)] = &[
    ("identifier", "Identifier"),
    ("status", "code"),
    ("statusHistory", "BackboneElement"),
    ("class", "Coding"),
    ("classHistory", "BackboneElement"),
    ("type", "CodeableConcept"),
    ("serviceType", "CodeableConcept"),
    ("priority", "CodeableConcept"),
    ("subject", "Reference"),
    ("episodeOfCare", "Reference"),
    ("basedOn", "Reference"),
    ("participant", "BackboneElement"),
    ("appointment", "Reference"),
    ("period", "Period"),
    ("length", "Duration"),
    ("reasonCode", "CodeableConcept"),
    ("reasonReference", "Reference"),
    ("diagnosis", "BackboneElement"),
    ("account", "Reference"),
    ("hospitalization", "BackboneElement"),
    ("location", "BackboneElement"),
    ("serviceProvider", "Reference"),
    ("partOf", "Reference"),
];

const OBSERVATION: &[(&str, &str)] = &[
    ("identifier", "Identifier"),
    ("basedOn", "Reference"),
    ("partOf", "Reference"),
    ("status", "code"),
    ("category", "CodeableConcept"),
    ("code", "CodeableConcept"),
    ("subject", "Reference"),
    ("focus", "Reference"),
    ("encounter", "Reference"),
    ("effectiveDateTime", "dateTime"),
    ("effectivePeriod", "Period"),
    ("effectiveInstant", "instant"),
    ("issued", "instant"),
    ("performer", "Reference"),
    ("valueQuantity", "Quantity"),
    ("valueCodeableConcept", "CodeableConcept"),
    ("valueString", "string"),
    ("valueBoolean", "boolean"),
    ("valueInteger", "integer"),
    ("valueRange", "Range"),
    ("valueDateTime", "dateTime"),
    ("dataAbsentReason", "CodeableConcept"),
    ("interpretation", "CodeableConcept"),
    ("note", "Annotation"),
    ("bodySite", "CodeableConcept"),
    ("method", "CodeableConcept"),
    ("specimen", "Reference"),
    ("device", "Reference"),
    ("referenceRange", "BackboneElement"),
    ("hasMember", "Reference"),
    ("derivedFrom", "Reference"),
    ("component", "BackboneElement"),
];

const CONDITION: &[(&str, &str)] = &[
    ("identifier", "Identifier"),
    ("clinicalStatus", "CodeableConcept"),
    ("verificationStatus", "CodeableConcept"),
    ("category", "CodeableConcept"),
    ("severity", "CodeableConcept"),
    ("code", "CodeableConcept"),
    ("bodySite", "CodeableConcept"),
    ("subject", "Reference"),
    ("encounter", "Reference"),
    ("onsetDateTime", "dateTime"),
    ("onsetString", "string"),
    ("abatementDateTime", "dateTime"),
    ("abatementString", "string"),
    ("recordedDate", "dateTime"),
    ("recorder", "Reference"),
    ("asserter", "Reference"),
    ("stage", "BackboneElement"),
    ("evidence", "BackboneElement"),
    ("note", "Annotation"),
];

const PROCEDURE: &[(&str, &str)] = &[
    ("identifier", "Identifier"),
    ("basedOn", "Reference"),
    ("partOf", "Reference"),
    ("status", "code"),
    ("statusReason", "CodeableConcept"),
    ("category", "CodeableConcept"),
    ("code", "CodeableConcept"),
    ("subject", "Reference"),
    ("encounter", "Reference"),
    ("performedDateTime", "dateTime"),
    ("performedPeriod", "Period"),
    ("performedString", "string"),
    ("recorder", "Reference"),
    ("asserter", "Reference"),
    ("performer", "BackboneElement"),
    ("location", "Reference"),
    ("reasonCode", "CodeableConcept"),
    ("reasonReference", "Reference"),
    ("bodySite", "CodeableConcept"),
    ("outcome", "CodeableConcept"),
    ("report", "Reference"),
    ("complication", "CodeableConcept"),
    ("followUp", "CodeableConcept"),
    ("note", "Annotation"),
];

const MEDICATION_REQUEST: &[(&str, &str)] = &[
    ("identifier", "Identifier"),
    ("status", "code"),
    ("statusReason", "CodeableConcept"),
    ("intent", "code"),
    ("category", "CodeableConcept"),
    ("priority", "code"),
    ("doNotPerform", "boolean"),
    ("medicationCodeableConcept", "CodeableConcept"),
    ("medicationReference", "Reference"),
    ("subject", "Reference"),
    ("encounter", "Reference"),
    ("supportingInformation", "Reference"),
    ("authoredOn", "dateTime"),
    ("requester", "Reference"),
    ("performer", "Reference"),
    ("performerType", "CodeableConcept"),
    ("recorder", "Reference"),
    ("reasonCode", "CodeableConcept"),
    ("reasonReference", "Reference"),
    ("note", "Annotation"),
    ("dosageInstruction", "Dosage"),
    ("dispenseRequest", "BackboneElement"),
    ("substitution", "BackboneElement"),
    ("priorPrescription", "Reference"),
];

const DIAGNOSTIC_REPORT: &[(&str, &str)] = &[
    ("identifier", "Identifier"),
    ("basedOn", "Reference"),
    ("status", "code"),
    ("category", "CodeableConcept"),
    ("code", "CodeableConcept"),
    ("subject", "Reference"),
    ("encounter", "Reference"),
    ("effectiveDateTime", "dateTime"),
    ("effectivePeriod", "Period"),
    ("issued", "instant"),
    ("performer", "Reference"),
    ("resultsInterpreter", "Reference"),
    ("specimen", "Reference"),
    ("result", "Reference"),
    ("imagingStudy", "Reference"),
    ("media", "BackboneElement"),
    ("conclusion", "string"),
    ("conclusionCode", "CodeableConcept"),
    ("presentedForm", "Attachment"),
];

const ALLERGY_INTOLERANCE: &[(&str, &str)] = &[
    ("identifier", "Identifier"),
    ("clinicalStatus", "CodeableConcept"),
    ("verificationStatus", "CodeableConcept"),
    ("type", "code"),
    ("category", "code"),
    ("criticality", "code"),
    ("code", "CodeableConcept"),
    ("patient", "Reference"),
    ("encounter", "Reference"),
    ("onsetDateTime", "dateTime"),
    ("onsetString", "string"),
    ("recordedDate", "dateTime"),
    ("recorder", "Reference"),
    ("asserter", "Reference"),
    ("lastOccurrence", "dateTime"),
    ("note", "Annotation"),
    ("reaction", "BackboneElement"),
];

/// Built-in catalog of common FHIR R4 resources.
#[derive(Debug)]
pub struct R4Catalog {
    resources: HashMap<String, ResourceDefinition>,
}

impl R4Catalog {
    /// Build the catalog.
    pub fn new() -> Self {
        let tables: &[(&str, &[(&str, &str)])] = &[
            ("Patient", PATIENT),
            ("Practitioner", PRACTITIONER),
            ("Organization", ORGANIZATION),
            ("Encounter", ENCOUNTER),
            ("Observation", OBSERVATION),
            ("Condition", CONDITION),
            ("Procedure", PROCEDURE),
            ("MedicationRequest", MEDICATION_REQUEST),
            ("DiagnosticReport", DIAGNOSTIC_REPORT),
            ("AllergyIntolerance", ALLERGY_INTOLERANCE),
        ];

        let mut resources = HashMap::with_capacity(tables.len());
        for (name, children) in tables {
            let mut all: Vec<(&str, &str)> = BASE_ELEMENTS.to_vec();
            all.extend_from_slice(children);
            resources.insert(name.to_string(), ResourceDefinition::new(*name, &all));
        }
        Self { resources }
    }

    /// Register an additional resource definition.
    pub fn with_resource(mut self, definition: ResourceDefinition) -> Self {
        self.resources
            .insert(definition.name().to_string(), definition);
        self
    }

    /// Names of all known resource types.
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }
}

impl Default for R4Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureCatalog for R4Catalog {
    fn resource(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.get(name)
    }
}
