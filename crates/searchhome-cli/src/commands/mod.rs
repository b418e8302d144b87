pub mod check;
pub mod completion;
pub mod prefs;
pub mod run;
