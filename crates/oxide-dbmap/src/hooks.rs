//! Lifecycle hooks run around mutations and after selects.
//!
//! Every method of [`Hooks`] defaults to a no-op, so a record only runs the
//! stages it overrides. `#[derive(Record)]` emits an empty implementation
//! unless the type is annotated with `#[table(hooks)]`, in which case the
//! implementation is written by hand.

use std::fmt;

use tracing::trace;

use crate::error::{BoxError, HookError};

/// Result returned by a hook.
pub type HookResult = std::result::Result<(), BoxError>;

/// Stages of the fixed per-operation hook sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    AfterSelect,
}

impl HookStage {
    /// Returns the stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeInsert => "before_insert",
            Self::AfterInsert => "after_insert",
            Self::BeforeUpdate => "before_update",
            Self::AfterUpdate => "after_update",
            Self::BeforeDelete => "before_delete",
            Self::AfterDelete => "after_delete",
            Self::AfterSelect => "after_select",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle callbacks of a record type.
///
/// # Example
///
/// ```ignore
/// #[derive(Default, Record)]
/// #[table(name = "posts", hooks)]
/// struct Post {
///     #[column(primary_key, autoincrement)]
///     id: i64,
///     title: String,
/// }
///
/// impl Hooks for Post {
///     fn before_insert(&mut self) -> HookResult {
///         if self.title.is_empty() {
///             return Err("title is required".into());
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Hooks {
    /// Runs before the INSERT statement is bound.
    fn before_insert(&mut self) -> HookResult {
        Ok(())
    }

    /// Runs after the INSERT succeeded and generated keys were written back.
    fn after_insert(&mut self) -> HookResult {
        Ok(())
    }

    /// Runs before the UPDATE statement is bound.
    fn before_update(&mut self) -> HookResult {
        Ok(())
    }

    /// Runs after the UPDATE succeeded and the version was bumped.
    fn after_update(&mut self) -> HookResult {
        Ok(())
    }

    /// Runs before the DELETE statement is bound.
    fn before_delete(&mut self) -> HookResult {
        Ok(())
    }

    /// Runs after the DELETE succeeded.
    fn after_delete(&mut self) -> HookResult {
        Ok(())
    }

    /// Runs on every record produced by `get` or a select.
    fn after_select(&mut self) -> HookResult {
        Ok(())
    }
}

/// Runs `stage` on `record`, wrapping a failure with the stage and entity.
///
/// `entity` labels the record and is only evaluated when the hook fails.
pub(crate) fn run<H: Hooks + ?Sized>(
    stage: HookStage,
    record: &mut H,
    entity: impl FnOnce(&H) -> String,
) -> Result<(), HookError> {
    let outcome = match stage {
        HookStage::BeforeInsert => record.before_insert(),
        HookStage::AfterInsert => record.after_insert(),
        HookStage::BeforeUpdate => record.before_update(),
        HookStage::AfterUpdate => record.after_update(),
        HookStage::BeforeDelete => record.before_delete(),
        HookStage::AfterDelete => record.after_delete(),
        HookStage::AfterSelect => record.after_select(),
    };
    outcome.map_err(|source| {
        let entity = entity(record);
        trace!(stage = %stage, entity = %entity, "hook failed");
        HookError {
            stage,
            entity,
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        calls: Vec<HookStage>,
        fail_on: Option<HookStage>,
    }

    impl Counter {
        fn record(&mut self, stage: HookStage) -> HookResult {
            self.calls.push(stage);
            if self.fail_on == Some(stage) {
                return Err(format!("{stage} refused").into());
            }
            Ok(())
        }
    }

    impl Hooks for Counter {
        fn before_insert(&mut self) -> HookResult {
            self.record(HookStage::BeforeInsert)
        }

        fn after_select(&mut self) -> HookResult {
            self.record(HookStage::AfterSelect)
        }
    }

    struct Plain;

    impl Hooks for Plain {}

    #[test]
    fn test_default_hooks_are_no_ops() {
        let mut plain = Plain;
        for stage in [
            HookStage::BeforeInsert,
            HookStage::AfterUpdate,
            HookStage::AfterDelete,
            HookStage::AfterSelect,
        ] {
            assert!(run(stage, &mut plain, |_| String::new()).is_ok());
        }
    }

    #[test]
    fn test_run_dispatches_to_stage() {
        let mut counter = Counter::default();
        run(HookStage::BeforeInsert, &mut counter, |_| String::new()).unwrap();
        run(HookStage::AfterUpdate, &mut counter, |_| String::new()).unwrap();
        run(HookStage::AfterSelect, &mut counter, |_| String::new()).unwrap();
        assert_eq!(
            counter.calls,
            vec![HookStage::BeforeInsert, HookStage::AfterSelect]
        );
    }

    #[test]
    fn test_failure_carries_stage_and_entity() {
        let mut counter = Counter {
            fail_on: Some(HookStage::BeforeInsert),
            ..Counter::default()
        };
        let err = run(HookStage::BeforeInsert, &mut counter, |c| {
            format!("counter(calls={})", c.calls.len())
        })
        .unwrap_err();
        assert_eq!(err.stage, HookStage::BeforeInsert);
        assert_eq!(err.entity, "counter(calls=1)");
        assert_eq!(
            err.to_string(),
            "before_insert hook failed for counter(calls=1): before_insert refused"
        );
    }
}
