use crate::core::{Blob, Clock, MasterError, Result};
use crate::master::{Master, MasterConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{Level, event};

/// Document families served side by side, one master each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    Convention,
    CurveDefinition,
    TimeSeries,
    VolatilityDefinition,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Convention,
        DocumentType::CurveDefinition,
        DocumentType::TimeSeries,
        DocumentType::VolatilityDefinition,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Convention => "convention",
            Self::CurveDefinition => "curve-definition",
            Self::TimeSeries => "time-series",
            Self::VolatilityDefinition => "volatility-definition",
        }
    }

    /// Object id scheme of the type's master.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Convention => "DbCnv",
            Self::CurveDefinition => "DbCrv",
            Self::TimeSeries => "DbHts",
            Self::VolatilityDefinition => "DbVol",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DocumentType {
    type Err = MasterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| MasterError::UnknownKind(format!("Unknown document type: {}", s)))
    }
}

/// Every master the process serves, built once at startup.
pub struct MasterRegistry {
    masters: HashMap<DocumentType, Arc<Master<Blob>>>,
}

impl MasterRegistry {
    /// One master per document type, each configured from `template` under
    /// the type's own scheme.
    pub fn new(template: &MasterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut masters = HashMap::with_capacity(DocumentType::ALL.len());
        for kind in DocumentType::ALL {
            let mut config = template.clone();
            config.scheme = kind.scheme().to_string();
            masters.insert(kind, Arc::new(Master::with_clock(config, Arc::clone(&clock))?));
        }
        event!(Level::INFO, masters = masters.len(), "registry ready");
        Ok(Self { masters })
    }

    pub fn master(&self, kind: DocumentType) -> Result<&Arc<Master<Blob>>> {
        self.masters
            .get(&kind)
            .ok_or_else(|| MasterError::UnknownKind(format!("No master for {}", kind)))
    }

    /// Master for a document type name such as `curve-definition`.
    pub fn get(&self, name: &str) -> Result<&Arc<Master<Blob>>> {
        self.master(name.parse()?)
    }

    pub fn shutdown(&self) {
        for master in self.masters.values() {
            master.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SystemClock;

    #[test]
    fn test_document_type_names() {
        for kind in DocumentType::ALL {
            assert_eq!(kind.name().parse::<DocumentType>().unwrap(), kind);
        }
        let err = "portfolio".parse::<DocumentType>().unwrap_err();
        assert!(matches!(err, MasterError::UnknownKind(_)));
    }

    #[test]
    fn test_each_type_gets_its_own_scheme() {
        let registry = MasterRegistry::new(&MasterConfig::default(), Arc::new(SystemClock)).unwrap();
        assert_eq!(registry.get("convention").unwrap().scheme(), "DbCnv");
        assert_eq!(registry.get("TIME-SERIES").unwrap().scheme(), "DbHts");
        assert!(registry.get("trade").is_err());

        registry.shutdown();
        assert!(!registry.master(DocumentType::CurveDefinition).unwrap().is_open());
    }
}
