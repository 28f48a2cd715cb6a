//! Capabilities shared by everything the registry can create.

use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::configure::Schema;
use crate::step::{Step, StepContext, StepError};

/// Type-erasure helpers for configurable objects.
///
/// On a `Box<dyn Configurable>` call these through `as_ref()`/`as_mut()`,
/// otherwise the box itself is erased instead of its contents.
pub trait AsAny: Any {
  fn as_any(&self) -> &dyn Any;
  fn as_any_mut(&mut self) -> &mut dyn Any;
  fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
  fn as_any(&self) -> &dyn Any {
    self
  }

  fn as_any_mut(&mut self) -> &mut dyn Any {
    self
  }

  fn into_any(self: Box<Self>) -> Box<dyn Any> {
    self
  }
}

/// An object whose attributes and nested elements are set from a
/// declarative node.
pub trait Configurable: AsAny + Send {
  /// The table describing this type's attributes and elements.
  fn schema(&self) -> &'static Schema;

  /// The step capability, for objects created under the task role.
  fn as_step(&mut self) -> Option<&mut dyn Step> {
    None
  }

  /// The condition capability, for objects created under the condition role.
  fn as_condition(&self) -> Option<&dyn Condition> {
    None
  }
}

/// A configured instance registered under an `id`.
///
/// Every `refid` use copies its current state, so changes made through the
/// handle show up in later uses.
pub type SharedObject = Arc<Mutex<Box<dyn Configurable>>>;

/// A boolean test used by conditional steps.
pub trait Condition: Send {
  fn evaluate(&self, ctx: &StepContext<'_>) -> Result<bool, StepError>;
}
