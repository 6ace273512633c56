pub mod ast;
pub mod attribute;
pub mod options;
pub mod validator;
pub mod matcher;
