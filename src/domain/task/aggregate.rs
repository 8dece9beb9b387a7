use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commands::{NewTask, TaskCommand};
use super::errors::TaskError;
use super::events::*;
use super::value_objects::TaskStatus;
use crate::event_sourcing::core::{Aggregate, AggregateRoot, DomainEvent, EventError};

// ============================================================================
// Task Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAggregate {
    root: AggregateRoot,

    // Current State (derived from events)
    pub title: String,
    pub description: String,
    pub family_id: String,
    pub assigned_to: Vec<String>,
    pub created_by: String,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub deleted: bool,
}

impl TaskAggregate {
    /// New task at version 1 with its `TaskCreatedEvent` pending.
    pub fn create(task_id: &str, new_task: NewTask) -> Result<Self, TaskError> {
        if new_task.title.trim().is_empty() {
            return Err(TaskError::EmptyTitle);
        }

        let mut assigned_to = Vec::with_capacity(new_task.assigned_to.len());
        for user_id in new_task.assigned_to {
            if !assigned_to.contains(&user_id) {
                assigned_to.push(user_id);
            }
        }

        let created_at = Utc::now();
        let created = TaskEvent::Created(TaskCreated {
            title: new_task.title,
            description: new_task.description,
            family_id: new_task.family_id,
            assigned_to,
            assigned_by: new_task.assigned_by,
            due_date: new_task.due_date,
            location: new_task.location,
            created_at,
        });

        let mut task = Self::apply_first_event(task_id, &created, created_at)?;
        task.root.record(&created)?;
        Ok(task)
    }

    pub fn is_assigned(&self, user_id: &str) -> bool {
        self.assigned_to.iter().any(|assigned| assigned == user_id)
    }

    fn ensure_not_deleted(&self) -> Result<(), TaskError> {
        if self.deleted {
            return Err(TaskError::Deleted);
        }
        Ok(())
    }

    fn changed_details(
        &self,
        title: &Option<String>,
        description: &Option<String>,
        due_date: &Option<DateTime<Utc>>,
        location: &Option<String>,
        updated_by: &str,
    ) -> Result<Option<TaskUpdated>, TaskError> {
        if let Some(title) = title {
            if title.trim().is_empty() {
                return Err(TaskError::EmptyTitle);
            }
        }

        let update = TaskUpdated {
            title: title.clone().filter(|t| *t != self.title),
            description: description.clone().filter(|d| *d != self.description),
            due_date: due_date.filter(|d| Some(*d) != self.due_date),
            location: location.clone().filter(|l| Some(l) != self.location.as_ref()),
            updated_by: updated_by.to_string(),
            updated_at: Utc::now(),
        };

        let unchanged = update.title.is_none()
            && update.description.is_none()
            && update.due_date.is_none()
            && update.location.is_none();
        Ok(if unchanged { None } else { Some(update) })
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for TaskAggregate {
    type Event = TaskEvent;
    type Command = TaskCommand;
    type Error = TaskError;

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
            TaskEvent::Created(e) => Ok(Self {
                root: AggregateRoot::restored(aggregate_id, e.created_at, occurred_on),
                title: e.title.clone(),
                description: e.description.clone(),
                family_id: e.family_id.clone(),
                assigned_to: e.assigned_to.clone(),
                created_by: e.assigned_by.clone(),
                status: TaskStatus::Pending,
                due_date: e.due_date,
                location: e.location.clone(),
                deleted: false,
            }),
            _ => Err(EventError::NotCreationEvent {
                aggregate_id: aggregate_id.to_string(),
                event_type: event.event_type().to_string(),
                expected: TaskEvent::CREATED_EVENT_TYPE,
            }
            .into()),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            TaskEvent::Created(_) => {
                // First event already applied
            }
            TaskEvent::Updated(e) => {
                if let Some(title) = &e.title {
                    self.title = title.clone();
                }
                if let Some(description) = &e.description {
                    self.description = description.clone();
                }
                if e.due_date.is_some() {
                    self.due_date = e.due_date;
                }
                if e.location.is_some() {
                    self.location = e.location.clone();
                }
            }
            TaskEvent::StatusChanged(e) => {
                self.status = e.new_status;
            }
            TaskEvent::AssignmentAdded(e) => {
                if !self.is_assigned(&e.assigned_to) {
                    self.assigned_to.push(e.assigned_to.clone());
                }
            }
            TaskEvent::AssignmentRemoved(e) => {
                self.assigned_to.retain(|user_id| *user_id != e.assigned_to);
            }
            TaskEvent::Deleted(_) => {
                self.deleted = true;
            }
        }
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_not_deleted()?;

        match command {
            TaskCommand::UpdateDetails {
                title,
                description,
                due_date,
                location,
                updated_by,
            } => Ok(self
                .changed_details(title, description, due_date, location, updated_by)?
                .map(TaskEvent::Updated)
                .into_iter()
                .collect()),

            TaskCommand::ChangeStatus { new_status, changed_by } => {
                if !self.status.can_transition_to(*new_status) {
                    return Err(TaskError::InvalidStatusTransition {
                        from: self.status,
                        to: *new_status,
                    });
                }

                Ok(vec![TaskEvent::StatusChanged(TaskStatusChanged {
                    old_status: self.status,
                    new_status: *new_status,
                    changed_by: changed_by.clone(),
                    changed_at: Utc::now(),
                })])
            }

            TaskCommand::AssignUser { user_id, assigned_by } => {
                if self.is_assigned(user_id) {
                    return Err(TaskError::AlreadyAssigned(user_id.clone()));
                }

                Ok(vec![TaskEvent::AssignmentAdded(TaskAssignmentAdded {
                    assigned_to: user_id.clone(),
                    assigned_by: assigned_by.clone(),
                    assigned_at: Utc::now(),
                })])
            }

            TaskCommand::UnassignUser { user_id, removed_by } => {
                if !self.is_assigned(user_id) {
                    return Err(TaskError::NotAssigned(user_id.clone()));
                }

                Ok(vec![TaskEvent::AssignmentRemoved(TaskAssignmentRemoved {
                    assigned_to: user_id.clone(),
                    removed_by: removed_by.clone(),
                    removed_at: Utc::now(),
                })])
            }

            TaskCommand::DeleteTask => Ok(vec![TaskEvent::Deleted(TaskDeleted {
                title: self.title.clone(),
                family_id: self.family_id.clone(),
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

    fn new_task() -> NewTask {
        NewTask {
            title: "Water the plants".to_string(),
            description: "Balcony and kitchen".to_string(),
            family_id: "family-1".to_string(),
            assigned_to: vec!["kid-1".to_string(), "kid-1".to_string()],
            assigned_by: "parent-1".to_string(),
            due_date: None,
            location: Some("home".to_string()),
        }
    }

    fn change_status(status: TaskStatus) -> TaskCommand {
        TaskCommand::ChangeStatus {
            new_status: status,
            changed_by: "parent-1".to_string(),
        }
    }

    #[test]
    fn test_create_task() {
        let task = TaskAggregate::create("task-1", new_task()).unwrap();

        assert_eq!(task.version(), 1);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.assigned_to, vec!["kid-1".to_string()]);
        assert_eq!(task.created_by, "parent-1");
        assert_eq!(task.root().uncommitted_events()[0].event_type(), "TaskCreatedEvent");
        assert_eq!(task.root().uncommitted_events()[0].aggregate_type(), "Task");
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let mut input = new_task();
        input.title = "   ".to_string();

        assert!(matches!(TaskAggregate::create("task-1", input), Err(TaskError::EmptyTitle)));
    }

    #[test]
    fn test_status_lifecycle() {
        let mut task = TaskAggregate::create("task-1", new_task()).unwrap();

        task.execute(&change_status(TaskStatus::InProgress)).unwrap();
        task.execute(&change_status(TaskStatus::Completed)).unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.version(), 3);
    }

    #[test]
    fn test_invalid_status_transition() {
        let mut task = TaskAggregate::create("task-1", new_task()).unwrap();

        let result = task.execute(&change_status(TaskStatus::Completed));

        assert!(matches!(
            result,
            Err(TaskError::InvalidStatusTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::Completed
            })
        ));
        assert_eq!(task.version(), 1);
    }

    #[test]
    fn test_assignment_rules() {
        let mut task = TaskAggregate::create("task-1", new_task()).unwrap();

        let duplicate = task.execute(&TaskCommand::AssignUser {
            user_id: "kid-1".to_string(),
            assigned_by: "parent-1".to_string(),
        });
        assert!(matches!(duplicate, Err(TaskError::AlreadyAssigned(_))));

        task.execute(&TaskCommand::AssignUser {
            user_id: "kid-2".to_string(),
            assigned_by: "parent-1".to_string(),
        })
        .unwrap();
        task.execute(&TaskCommand::UnassignUser {
            user_id: "kid-1".to_string(),
            removed_by: "parent-1".to_string(),
        })
        .unwrap();

        assert_eq!(task.assigned_to, vec!["kid-2".to_string()]);

        let missing = task.execute(&TaskCommand::UnassignUser {
            user_id: "kid-1".to_string(),
            removed_by: "parent-1".to_string(),
        });
        assert!(matches!(missing, Err(TaskError::NotAssigned(_))));
    }

    #[test]
    fn test_update_only_records_changed_fields() {
        let mut task = TaskAggregate::create("task-1", new_task()).unwrap();

        let unchanged = task
            .execute(&TaskCommand::UpdateDetails {
                title: Some("Water the plants".to_string()),
                description: None,
                due_date: None,
                location: Some("home".to_string()),
                updated_by: "parent-1".to_string(),
            })
            .unwrap();
        assert_eq!(unchanged, 0);
        assert_eq!(task.version(), 1);

        task.execute(&TaskCommand::UpdateDetails {
            title: Some("Water all plants".to_string()),
            description: None,
            due_date: None,
            location: Some("home".to_string()),
            updated_by: "parent-1".to_string(),
        })
        .unwrap();

        let payload = task.root().uncommitted_events()[1].payload();
        assert_eq!(payload["title"], "Water all plants");
        assert!(payload["location"].is_null());
        assert_eq!(task.title, "Water all plants");
    }

    #[test]
    fn test_deleted_task_rejects_commands() {
        let mut task = TaskAggregate::create("task-1", new_task()).unwrap();
        task.execute(&TaskCommand::DeleteTask).unwrap();

        assert!(task.deleted);
        assert!(matches!(
            task.execute(&change_status(TaskStatus::InProgress)),
            Err(TaskError::Deleted)
        ));
    }

    #[test]
    fn test_rebuild_matches_live_task() {
        let mut live = TaskAggregate::create("task-1", new_task()).unwrap();
        live.execute(&change_status(TaskStatus::InProgress)).unwrap();
        live.execute(&TaskCommand::AssignUser {
            user_id: "kid-2".to_string(),
            assigned_by: "parent-1".to_string(),
        })
        .unwrap();

        let history: Vec<Event> = live.root().uncommitted_events().to_vec();
        let rebuilt = TaskAggregate::rebuild_from_events("task-1", &history).unwrap();

        assert_eq!(rebuilt.version(), 3);
        assert_eq!(rebuilt.status, live.status);
        assert_eq!(rebuilt.assigned_to, live.assigned_to);
        assert_eq!(rebuilt.title, live.title);
        assert_eq!(rebuilt.location, live.location);
        assert_eq!(rebuilt.root().created_at(), live.root().created_at());
    }
}
