use super::ConfigError;

/// Backend resolving `${...}` references found in config values.
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError>;
}

/// Resolves environment variables and files.
///
/// - `${VAR}` and `${env:VAR}` read an environment variable
/// - `${file:/run/secrets/db_password}` reads a file (trimmed)
pub struct DefaultSecretResolver;

impl SecretResolver for DefaultSecretResolver {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError> {
        let reference = reference.trim();
        if let Some(path) = reference.strip_prefix("file:") {
            let path = path.trim();
            return std::fs::read_to_string(path)
                .map(|s| s.trim().to_string())
                .map_err(|e| ConfigError::Load(format!("Secret file '{path}': {e}")));
        }
        let var = reference.strip_prefix("env:").unwrap_or(reference).trim();
        std::env::var(var).map_err(|_| ConfigError::NotFound(var.to_string()))
    }
}

/// Replace every `${...}` placeholder in `value`.
pub fn resolve_placeholders(
    value: &str,
    resolver: &dyn SecretResolver,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        let len = rest[start..]
            .find('}')
            .ok_or_else(|| ConfigError::Load(format!("Unclosed placeholder in: {value}")))?;
        out.push_str(&rest[..start]);
        out.push_str(&resolver.resolve(&rest[start + 2..start + len])?);
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl SecretResolver for Fixed {
        fn resolve(&self, reference: &str) -> Result<String, ConfigError> {
            match reference {
                "DB_HOST" => Ok("db.internal".into()),
                other => Err(ConfigError::NotFound(other.into())),
            }
        }
    }

    #[test]
    fn resolves_inside_larger_string() {
        let resolved = resolve_placeholders("postgres://${DB_HOST}:5432/app", &Fixed).unwrap();
        assert_eq!(resolved, "postgres://db.internal:5432/app");
    }

    #[test]
    fn unknown_reference_is_not_found() {
        let err = resolve_placeholders("${MISSING}", &Fixed).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(key) if key == "MISSING"));
    }

    #[test]
    fn unclosed_placeholder_fails() {
        assert!(resolve_placeholders("${UNCLOSED", &Fixed).is_err());
    }

    #[test]
    fn file_reference_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.txt");
        std::fs::write(&path, "s3cret\n").unwrap();

        let value = format!("${{file:{}}}", path.display());
        assert_eq!(resolve_placeholders(&value, &DefaultSecretResolver).unwrap(), "s3cret");
    }
}
