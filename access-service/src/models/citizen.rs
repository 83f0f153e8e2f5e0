use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{ClientAccountId, Creatable, Exportable, HasTenantOwner, Patchable, Resource};
use crate::services::ServiceError;

/// Person record kept inside a tenant.
#[derive(Debug, Clone, FromRow)]
pub struct Citizen {
    pub id: i64,
    pub client_account_id: ClientAccountId,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub age: Option<i64>,
    pub salary: Option<i64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicCitizen {
    pub id: i64,
    pub client_account_id: ClientAccountId,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub age: Option<i64>,
    pub salary: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CitizenPatch {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub age: Option<i64>,
    pub salary: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewCitizen {
    pub client_account_id: ClientAccountId,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub age: Option<i64>,
    pub salary: Option<i64>,
}

impl Exportable for Citizen {
    type Public = PublicCitizen;

    fn to_public(&self) -> PublicCitizen {
        PublicCitizen {
            id: self.id,
            client_account_id: self.client_account_id,
            name: self.name.clone(),
            surname: self.surname.clone(),
            age: self.age,
            salary: self.salary,
        }
    }
}

impl Resource for Citizen {
    const NAME: &'static str = "Citizen";

    fn id(&self) -> i64 {
        self.id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl HasTenantOwner for Citizen {
    fn tenant_id(&self) -> ClientAccountId {
        self.client_account_id
    }
}

impl Patchable for Citizen {
    type Patch = CitizenPatch;

    fn apply_patch(&mut self, patch: CitizenPatch) -> Result<(), ServiceError> {
        for (field, value) in [("name", &patch.name), ("surname", &patch.surname)] {
            if value.as_ref().is_some_and(|v| v.chars().count() > 50) {
                return Err(ServiceError::ValidationError(format!(
                    "{} must be at most 50 characters",
                    field
                )));
            }
        }
        if patch.age.is_some_and(|age| !(0..=150).contains(&age)) {
            return Err(ServiceError::ValidationError("age must be between 0 and 150".into()));
        }
        if patch.salary.is_some_and(|salary| salary < 0) {
            return Err(ServiceError::ValidationError("salary must not be negative".into()));
        }

        if let Some(name) = patch.name {
            self.name = Some(name);
        }
        if let Some(surname) = patch.surname {
            self.surname = Some(surname);
        }
        if let Some(age) = patch.age {
            self.age = Some(age);
        }
        if let Some(salary) = patch.salary {
            self.salary = Some(salary);
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        Ok(())
    }
}

impl Creatable for Citizen {
    type Draft = NewCitizen;

    fn from_draft(draft: NewCitizen, _now: DateTime<Utc>) -> Result<Self, ServiceError> {
        let mut citizen = Citizen {
            id: 0,
            client_account_id: draft.client_account_id,
            name: None,
            surname: None,
            age: None,
            salary: None,
            is_active: true,
        };
        citizen.apply_patch(CitizenPatch {
            name: draft.name,
            surname: draft.surname,
            age: draft.age,
            salary: draft.salary,
            is_active: None,
        })?;
        Ok(citizen)
    }
}
