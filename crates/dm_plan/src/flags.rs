use bitflags::bitflags;

bitflags! {
    /// What a [`ConstructionPlan`](crate::ConstructionPlan) has to do, computed
    /// once when the plan is built.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PlanFlags: u8 {
        /// Some field reads from a path other than its name.
        const MAPS_FROM = 1 << 0;
        /// Some field exports under a path other than its name.
        const MAPS_TO   = 1 << 1;
        /// Some field is left out of exports.
        const HIDES     = 1 << 2;
        /// Some field is never read from the source.
        const COMPUTES  = 1 << 3;
        /// Some field is converted by a caster.
        const CASTS     = 1 << 4;
        /// Some field carries validation rules.
        const VALIDATES = 1 << 5;
    }
}

impl PlanFlags {
    /// Flags that need [`FieldHooks`](crate::FieldHooks) during hydration.
    pub const HOOKED: Self = Self::CASTS.union(Self::VALIDATES);
    /// Flags that make an export differ from the input.
    pub const RESHAPES: Self = Self::MAPS_TO.union(Self::HIDES);
}
