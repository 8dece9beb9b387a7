use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commands::FamilyCommand;
use super::errors::FamilyError;
use super::events::*;
use super::value_objects::*;
use crate::event_sourcing::core::{Aggregate, AggregateRoot, DomainEvent, EventError};

// ============================================================================
// Family Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyAggregate {
    root: AggregateRoot,

    pub name: String,
    pub principal_responsible_user_id: String,
    pub members: Vec<FamilyMember>,
    pub deleted: bool,
}

impl FamilyAggregate {
    /// New family whose creator becomes its principal responsible member.
    pub fn create(
        family_id: &str,
        name: &str,
        principal_user_id: &str,
        principal_role: FamilyRole,
    ) -> Result<Self, FamilyError> {
        let name = validate_name(name)?;
        let created_at = Utc::now();
        let created = FamilyEvent::Created(FamilyCreated {
            name,
            principal_responsible_user_id: principal_user_id.to_string(),
            principal_role,
            created_at,
        });

        let mut family = Self::apply_first_event(family_id, &created, created_at)?;
        family.root.record(&created)?;
        Ok(family)
    }

    pub fn member(&self, user_id: &str) -> Option<&FamilyMember> {
        self.members.iter().find(|member| member.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.member(user_id).is_some()
    }

    fn auxiliary_responsibles(&self) -> usize {
        self.members
            .iter()
            .filter(|member| member.responsibility == FamilyResponsibility::AuxiliaryResponsible)
            .count()
    }

    fn ensure_auxiliary_slot(&self, current: Option<FamilyResponsibility>) -> Result<(), FamilyError> {
        if current == Some(FamilyResponsibility::AuxiliaryResponsible) {
            return Ok(());
        }
        if self.auxiliary_responsibles() >= MAX_AUXILIARY_RESPONSIBLES {
            return Err(FamilyError::TooManyAuxiliaryResponsibles(MAX_AUXILIARY_RESPONSIBLES));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, FamilyError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if !(FAMILY_NAME_MIN_LEN..=FAMILY_NAME_MAX_LEN).contains(&len) {
        return Err(FamilyError::InvalidName {
            min: FAMILY_NAME_MIN_LEN,
            max: FAMILY_NAME_MAX_LEN,
        });
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for FamilyAggregate {
    type Event = FamilyEvent;
    type Command = FamilyCommand;
    type Error = FamilyError;

    fn root(&self) -> &AggregateRoot {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot {
        &mut self.root
    }

    fn apply_first_event(
        aggregate_id: &str,
        event: &Self::Event,
        occurred_on: DateTime<Utc>,
    ) -> Result<Self, Self::Error> {
        match event {
            FamilyEvent::Created(e) => Ok(Self {
                root: AggregateRoot::restored(aggregate_id, e.created_at, occurred_on),
                name: e.name.clone(),
                principal_responsible_user_id: e.principal_responsible_user_id.clone(),
                members: vec![FamilyMember {
                    user_id: e.principal_responsible_user_id.clone(),
                    role: e.principal_role,
                    responsibility: FamilyResponsibility::PrincipalResponsible,
                    joined_at: e.created_at,
                }],
                deleted: false,
            }),
            _ => Err(EventError::NotCreationEvent {
                aggregate_id: aggregate_id.to_string(),
                event_type: event.event_type().to_string(),
                expected: FamilyEvent::CREATED_EVENT_TYPE,
            }
            .into()),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            FamilyEvent::Created(_) => {}
            FamilyEvent::MemberAdded(e) => {
                if !self.is_member(&e.user_id) {
                    self.members.push(FamilyMember {
                        user_id: e.user_id.clone(),
                        role: e.role,
                        responsibility: e.responsibility,
                        joined_at: e.added_at,
                    });
                }
            }
            FamilyEvent::MemberRemoved(e) => {
                self.members.retain(|member| member.user_id != e.user_id);
            }
            FamilyEvent::MemberRoleChanged(e) => {
                if let Some(member) = self.members.iter_mut().find(|m| m.user_id == e.user_id) {
                    member.role = e.new_role;
                    member.responsibility = e.new_responsibility;
                }
            }
            FamilyEvent::Deleted(_) => {
                self.deleted = true;
            }
        }
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if self.deleted {
            return Err(FamilyError::Deleted);
        }

        match command {
            FamilyCommand::AddMember {
                user_id,
                role,
                responsibility,
                added_by,
            } => {
                if self.is_member(user_id) {
                    return Err(FamilyError::AlreadyMember(user_id.clone()));
                }
                if *responsibility == FamilyResponsibility::PrincipalResponsible {
                    return Err(FamilyError::PrincipalResponsibleRequired);
                }
                if *responsibility == FamilyResponsibility::AuxiliaryResponsible {
                    self.ensure_auxiliary_slot(None)?;
                }

                Ok(vec![FamilyEvent::MemberAdded(MemberAdded {
                    user_id: user_id.clone(),
                    role: *role,
                    responsibility: *responsibility,
                    added_by: added_by.clone(),
                    added_at: Utc::now(),
                })])
            }

            FamilyCommand::RemoveMember { user_id, removed_by } => {
                if !self.is_member(user_id) {
                    return Err(FamilyError::MemberNotFound(user_id.clone()));
                }
                if *user_id == self.principal_responsible_user_id {
                    return Err(FamilyError::PrincipalResponsibleRequired);
                }

                Ok(vec![FamilyEvent::MemberRemoved(MemberRemoved {
                    user_id: user_id.clone(),
                    removed_by: removed_by.clone(),
                    removed_at: Utc::now(),
                })])
            }

            FamilyCommand::ChangeMemberRole {
                user_id,
                new_role,
                new_responsibility,
                changed_by,
            } => {
                let member = self
                    .member(user_id)
                    .ok_or_else(|| FamilyError::MemberNotFound(user_id.clone()))?;

                let is_principal = *user_id == self.principal_responsible_user_id;
                let becomes_principal = *new_responsibility == FamilyResponsibility::PrincipalResponsible;
                if is_principal != becomes_principal {
                    return Err(FamilyError::PrincipalResponsibleRequired);
                }
                if *new_responsibility == FamilyResponsibility::AuxiliaryResponsible {
                    self.ensure_auxiliary_slot(Some(member.responsibility))?;
                }

                Ok(vec![FamilyEvent::MemberRoleChanged(MemberRoleChanged {
                    user_id: user_id.clone(),
                    old_role: member.role,
                    old_responsibility: member.responsibility,
                    new_role: *new_role,
                    new_responsibility: *new_responsibility,
                    changed_by: changed_by.clone(),
                    changed_at: Utc::now(),
                })])
            }

            FamilyCommand::DeleteFamily => Ok(vec![FamilyEvent::Deleted(FamilyDeleted {
                name: self.name.clone(),
                deleted_at: Utc::now(),
            })]),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::Event;

    fn family() -> FamilyAggregate {
        FamilyAggregate::create("fam-1", "  Silva  ", "mom", FamilyRole::Mother).unwrap()
    }

    fn add(user_id: &str, responsibility: FamilyResponsibility) -> FamilyCommand {
        FamilyCommand::AddMember {
            user_id: user_id.to_string(),
            role: FamilyRole::Member,
            responsibility,
            added_by: "mom".to_string(),
        }
    }

    #[test]
    fn test_create_family_adds_principal_member() {
        let family = family();

        assert_eq!(family.name, "Silva");
        assert_eq!(family.version(), 1);
        assert_eq!(family.members.len(), 1);
        assert_eq!(
            family.member("mom").unwrap().responsibility,
            FamilyResponsibility::PrincipalResponsible
        );
    }

    #[test]
    fn test_create_rejects_short_name() {
        let result = FamilyAggregate::create("fam-1", " S ", "mom", FamilyRole::Mother);
        assert!(matches!(result, Err(FamilyError::InvalidName { .. })));
    }

    #[test]
    fn test_membership_rules() {
        let mut family = family();
        family.execute(&add("kid", FamilyResponsibility::Member)).unwrap();

        assert!(matches!(
            family.execute(&add("kid", FamilyResponsibility::Member)),
            Err(FamilyError::AlreadyMember(_))
        ));
        assert!(matches!(
            family.execute(&FamilyCommand::RemoveMember {
                user_id: "stranger".to_string(),
                removed_by: "mom".to_string(),
            }),
            Err(FamilyError::MemberNotFound(_))
        ));
        assert!(matches!(
            family.execute(&FamilyCommand::RemoveMember {
                user_id: "mom".to_string(),
                removed_by: "mom".to_string(),
            }),
            Err(FamilyError::PrincipalResponsibleRequired)
        ));

        family
            .execute(&FamilyCommand::RemoveMember {
                user_id: "kid".to_string(),
                removed_by: "mom".to_string(),
            })
            .unwrap();
        assert!(!family.is_member("kid"));
        assert_eq!(family.version(), 3);
    }

    #[test]
    fn test_auxiliary_responsible_limit() {
        let mut family = family();
        family.execute(&add("dad", FamilyResponsibility::AuxiliaryResponsible)).unwrap();
        family.execute(&add("grandma", FamilyResponsibility::AuxiliaryResponsible)).unwrap();

        assert!(matches!(
            family.execute(&add("uncle", FamilyResponsibility::AuxiliaryResponsible)),
            Err(FamilyError::TooManyAuxiliaryResponsibles(2))
        ));
    }

    #[test]
    fn test_change_member_role_records_old_values() {
        let mut family = family();
        family.execute(&add("kid", FamilyResponsibility::Member)).unwrap();
        family
            .execute(&FamilyCommand::ChangeMemberRole {
                user_id: "kid".to_string(),
                new_role: FamilyRole::Daughter,
                new_responsibility: FamilyResponsibility::AuxiliaryResponsible,
                changed_by: "mom".to_string(),
            })
            .unwrap();

        let kid = family.member("kid").unwrap();
        assert_eq!(kid.role, FamilyRole::Daughter);
        assert_eq!(kid.responsibility, FamilyResponsibility::AuxiliaryResponsible);

        let payload = family.root().uncommitted_events()[2].payload();
        assert_eq!(payload["oldRole"], "MEMBER");
        assert_eq!(payload["newResponsibility"], "AUXILIARY_RESPONSIBLE");
    }

    #[test]
    fn test_rebuild_matches_live_family() {
        let mut live = family();
        live.execute(&add("kid", FamilyResponsibility::Member)).unwrap();
        live.execute(&add("dad", FamilyResponsibility::AuxiliaryResponsible)).unwrap();
        live.execute(&FamilyCommand::DeleteFamily).unwrap();

        let history: Vec<Event> = live.root().uncommitted_events().to_vec();
        let rebuilt = FamilyAggregate::rebuild_from_events("fam-1", &history).unwrap();

        assert_eq!(rebuilt.version(), 4);
        assert_eq!(rebuilt.members, live.members);
        assert!(rebuilt.deleted);
    }
}
