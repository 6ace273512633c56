use crate::core::config::CollectionConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::ValueType;
use crate::query::ast::{Predicate, Query};

/// Query validation configuration
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub max_bool_clauses: usize,
    pub max_query_depth: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::from(&CollectionConfig::default())
    }
}

impl From<&CollectionConfig> for ValidationConfig {
    fn from(config: &CollectionConfig) -> Self {
        ValidationConfig {
            max_bool_clauses: config.max_bool_clauses,
            max_query_depth: config.max_query_depth,
        }
    }
}

/// Query validator. Runs before any index is touched so a malformed query never fails
/// partway through a merge.
#[derive(Debug, Clone)]
pub struct QueryValidator {
    config: ValidationConfig,
}

impl QueryValidator {
    pub fn new(config: ValidationConfig) -> Self {
        QueryValidator { config }
    }

    /// Validate query structure and operand types
    pub fn validate<O>(&self, query: &Query<O>) -> Result<()> {
        self.validate_node(query, 0)
    }

    fn validate_node<O>(&self, query: &Query<O>, depth: usize) -> Result<()> {
        if depth > self.config.max_query_depth {
            return Err(Error::new(
                ErrorKind::InvalidQuery,
                format!("Query depth {} exceeds maximum {}", depth, self.config.max_query_depth),
            ));
        }

        match query {
            Query::And(children) | Query::Or(children) => {
                if children.is_empty() {
                    return Err(Error::invalid_query(format!(
                        "{} has no child queries",
                        if matches!(query, Query::And(_)) { "and" } else { "or" }
                    )));
                }
                if children.len() > self.config.max_bool_clauses {
                    return Err(Error::new(
                        ErrorKind::InvalidQuery,
                        format!("Boolean query has {} clauses, max is {}",
                                children.len(), self.config.max_bool_clauses),
                    ));
                }
                for child in children {
                    self.validate_node(child, depth + 1)?;
                }
                Ok(())
            }
            Query::Not(child) => self.validate_node(child, depth + 1),
            Query::Predicate(predicate) => Self::validate_predicate(predicate),
            Query::All | Query::None => Ok(()),
        }
    }

    fn validate_predicate<O>(predicate: &Predicate<O>) -> Result<()> {
        let declared = predicate.attribute.value_type();

        if predicate.operator.is_string_operator() && declared != ValueType::Text {
            return Err(Error::type_mismatch(format!(
                "{:?} requires a text attribute, \"{}\" is {:?}",
                predicate.operator.kind(),
                predicate.attribute.name(),
                declared
            )));
        }

        for operand in predicate.operator.operands() {
            if operand.value_type() != declared {
                return Err(Error::type_mismatch(format!(
                    "operand {} is {:?} but attribute \"{}\" is {:?}",
                    operand,
                    operand.value_type(),
                    predicate.attribute.name(),
                    declared
                )));
            }
        }
        Ok(())
    }
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
