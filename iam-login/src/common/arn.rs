use std::fmt;
use thiserror::Error;

/// Errors produced while parsing an IAM principal ARN
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArnError {
    #[error("empty ARN")]
    Empty,

    #[error("ARN {arn:?} has {found} ':'-separated fields, expected 6")]
    FieldCount { arn: String, found: usize },

    #[error("ARN {arn:?} does not start with \"arn\"")]
    MissingPrefix { arn: String },

    #[error("ARN {arn:?} is missing its {field}")]
    MissingField { arn: String, field: &'static str },

    #[error("ARN {arn:?} has non-numeric account number")]
    InvalidAccount { arn: String },

    #[error("ARN {arn:?} has a malformed resource: {reason}")]
    InvalidResource { arn: String, reason: &'static str },
}

/// The principal type of an IAM entity.
///
/// Only assumed roles carry a session name, so it lives on that variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalKind {
    User,
    Role,
    AssumedRole { session_name: String },
    InstanceProfile,
    Other(String),
}

impl PrincipalKind {
    fn from_segments(type_name: &str, session_name: Option<&str>) -> Self {
        match (type_name, session_name) {
            ("assumed-role", Some(session)) => Self::AssumedRole {
                session_name: session.to_string(),
            },
            ("user", _) => Self::User,
            ("role", _) => Self::Role,
            ("instance-profile", _) => Self::InstanceProfile,
            (other, _) => Self::Other(other.to_string()),
        }
    }

    /// The resource type as it appears in the ARN
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Role => "role",
            Self::AssumedRole { .. } => "assumed-role",
            Self::InstanceProfile => "instance-profile",
            Self::Other(name) => name,
        }
    }
}

/// Structured form of an IAM principal ARN such as
/// `arn:aws:iam::123456789012:role/path/Name` or
/// `arn:aws:sts::123456789012:assumed-role/Name/session`.
///
/// Values are only produced by [`IamEntity::parse`] and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamEntity {
    partition: String,
    service: String,
    account_number: String,
    kind: PrincipalKind,
    path: String,
    friendly_name: String,
}

impl IamEntity {
    /// Parse an ARN into its components
    pub fn parse(arn: &str) -> Result<Self, ArnError> {
        if arn.is_empty() {
            return Err(ArnError::Empty);
        }

        let fields: Vec<&str> = arn.split(':').collect();
        if fields.len() != 6 {
            return Err(ArnError::FieldCount {
                arn: arn.to_string(),
                found: fields.len(),
            });
        }
        if fields[0] != "arn" {
            return Err(ArnError::MissingPrefix {
                arn: arn.to_string(),
            });
        }

        let missing = |field| ArnError::MissingField {
            arn: arn.to_string(),
            field,
        };
        let partition = non_empty(fields[1]).ok_or_else(|| missing("partition"))?;
        let service = non_empty(fields[2]).ok_or_else(|| missing("service"))?;
        let account_number = non_empty(fields[4]).ok_or_else(|| missing("account number"))?;
        if !account_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(ArnError::InvalidAccount {
                arn: arn.to_string(),
            });
        }

        let invalid = |reason| ArnError::InvalidResource {
            arn: arn.to_string(),
            reason,
        };
        let segments: Vec<&str> = fields[5].split('/').collect();
        let type_name = non_empty(segments[0]).ok_or_else(|| invalid("empty principal type"))?;
        if segments.len() < 2 {
            return Err(invalid("no principal name"));
        }

        let (kind, path, friendly_name) = if type_name == "assumed-role" {
            // assumed-role/<role name>/<session name>, never a path
            if segments.len() != 3 {
                return Err(invalid("assumed-role needs a role name and a session name"));
            }
            let role_name = non_empty(segments[1]).ok_or_else(|| invalid("empty role name"))?;
            let session = non_empty(segments[2]).ok_or_else(|| invalid("empty session name"))?;
            (
                PrincipalKind::from_segments(type_name, Some(session)),
                String::new(),
                role_name,
            )
        } else {
            let last = segments.len() - 1;
            let name = non_empty(segments[last]).ok_or_else(|| invalid("empty principal name"))?;
            (
                PrincipalKind::from_segments(type_name, None),
                segments[1..last].join("/"),
                name,
            )
        };

        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            account_number: account_number.to_string(),
            kind,
            path,
            friendly_name: friendly_name.to_string(),
        })
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn kind(&self) -> &PrincipalKind {
        &self.kind
    }

    pub fn principal_type(&self) -> &str {
        self.kind.as_str()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// User, role or profile name. For assumed roles this is the role name.
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn session_info(&self) -> Option<&str> {
        match &self.kind {
            PrincipalKind::AssumedRole { session_name } => Some(session_name),
            _ => None,
        }
    }

    /// Normalized ARN used for role binding comparisons.
    ///
    /// Assumed-role sessions collapse onto the role they were assumed from.
    /// The path is dropped for every type because STS never reports the path
    /// of an assumed role.
    pub fn canonical_arn(&self) -> String {
        let entity_type = match self.kind {
            PrincipalKind::AssumedRole { .. } => "role",
            ref kind => kind.as_str(),
        };
        format!(
            "arn:{}:iam::{}:{}/{}",
            self.partition, self.account_number, entity_type, self.friendly_name
        )
    }

    /// The ARN as it was parsed, including service, path and session name
    pub fn full_arn(&self) -> String {
        let mut resource = self.kind.as_str().to_string();
        if !self.path.is_empty() {
            resource.push('/');
            resource.push_str(&self.path);
        }
        resource.push('/');
        resource.push_str(&self.friendly_name);
        if let Some(session) = self.session_info() {
            resource.push('/');
            resource.push_str(session);
        }
        format!(
            "arn:{}:{}::{}:{}",
            self.partition, self.service, self.account_number, resource
        )
    }
}

impl fmt::Display for IamEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_arn())
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
