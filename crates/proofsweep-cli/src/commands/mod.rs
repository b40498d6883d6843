pub(crate) mod helpers;
pub(crate) mod run;
