//! Graph nodes: identifiers, metadata, runtime units and edge copies.
mod activation;
mod computable;
mod constant;
mod copy;
mod dense;
mod id;
mod loss;
mod metadata;
mod placeholder;
mod state;

pub use activation::ActivationUnit;
pub use computable::{
    lock_unit, BuildContext, Compute, ComputableUnit, SharedUnit, UnitKind, UnitTensors,
};
pub use constant::ConstantUnit;
pub use copy::CopyUnit;
pub use dense::DenseUnit;
pub use id::{BaseKind, UnitId, UnitType, ACTIVATION, CONSTANT, DENSE, LOSS, PLACEHOLDER};
pub use loss::LossUnit;
pub use metadata::{Parameter, Parameters, UnitMetaData, BIAS, INPUT, LABEL, PREDICTION, WEIGHT};
pub use placeholder::{DataLoader, PlaceHolderUnit};
pub use state::{StateSnapshot, UnitState};
