use bitflags::bitflags;

bitflags! {
    /// Compilation flags on code units
    ///
    /// Code units store their raw flag word so that bits unknown to this table survive
    /// untouched. This is only a typed view over the known bits.
    pub struct CodeFlags: u32 {
        const OPTIMIZED = 0x0001;
        const NEWLOCALS = 0x0002;
        const VARARGS = 0x0004;
        const VARKEYWORDS = 0x0008;
        const NESTED = 0x0010;
        const GENERATOR = 0x0020;
        const NOFREE = 0x0040;
        const FUTURE_DIVISION = 0x2000;
        const FUTURE_ABSOLUTE_IMPORT = 0x4000;
        const FUTURE_WITH_STATEMENT = 0x8000;
        const FUTURE_PRINT_FUNCTION = 0x10000;
        const FUTURE_UNICODE_LITERALS = 0x20000;
    }
}
