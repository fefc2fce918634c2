use chrono::NaiveDate;

pub const PATIENT_NAME_MAX: usize = 80;
pub const GENDER_MAX: usize = 15;
pub const PATIENT_ADDITIONAL_MAX: usize = 80;

/// Optional patient fields written once into the EDF header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientInfo {
    pub patient: Option<String>,
    pub gender: Option<String>,
    pub patient_additional: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

impl PatientInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patient(mut self, name: impl Into<String>) -> Self {
        self.patient = Some(name.into());
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_patient_additional(mut self, additional: impl Into<String>) -> Self {
        self.patient_additional = Some(additional.into());
        self
    }

    pub fn with_birthdate(mut self, birthdate: NaiveDate) -> Self {
        self.birthdate = Some(birthdate);
        self
    }

    /// True when no field would end up in the header. Empty strings count
    /// as absent.
    pub fn is_empty(&self) -> bool {
        let blank = |field: &Option<String>| field.as_deref().map_or(true, str::is_empty);
        blank(&self.patient)
            && blank(&self.gender)
            && blank(&self.patient_additional)
            && self.birthdate.is_none()
    }

    /// Copy with every text field cut to its header limit and empty
    /// strings dropped.
    pub fn truncated(&self) -> Self {
        PatientInfo {
            patient: clip("patient", &self.patient, PATIENT_NAME_MAX),
            gender: clip("gender", &self.gender, GENDER_MAX),
            patient_additional: clip(
                "patient_additional",
                &self.patient_additional,
                PATIENT_ADDITIONAL_MAX,
            ),
            birthdate: self.birthdate,
        }
    }
}

fn clip(field: &str, value: &Option<String>, max: usize) -> Option<String> {
    let value = value.as_deref().filter(|v| !v.is_empty())?;
    let len = value.chars().count();
    if len > max {
        log::warn!("{field} is {len} characters, truncating to {max}");
        Some(value.chars().take(max).collect())
    } else {
        Some(value.to_string())
    }
}
