use crate::arena::Index;

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) Index);
    };
}

typed_id!(ObjectId);
typed_id!(ClockId);
typed_id!(ProcessId);
typed_id!(StorageId);
typed_id!(ArbitratorId);
