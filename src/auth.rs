use std::collections::BTreeMap;

/// Decides whether a login form submission opens the overview page.
pub trait AuthProvider: Send + Sync {
    fn validate(&self, user: &str, password: &str) -> bool;
}

/// Plain-text user/password pairs from the config file. Not access control.
pub struct StaticCredentials {
    users: BTreeMap<String, String>,
}

impl StaticCredentials {
    pub fn new(users: BTreeMap<String, String>) -> Self {
        Self { users }
    }
}

impl AuthProvider for StaticCredentials {
    fn validate(&self, user: &str, password: &str) -> bool {
        self.users.get(user).is_some_and(|p| p == password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pair_only() {
        let auth = StaticCredentials::new(BTreeMap::from([("admin".into(), "root".into())]));
        assert!(auth.validate("admin", "root"));
        assert!(!auth.validate("admin", "Root"));
        assert!(!auth.validate("root", "admin"));
        assert!(!auth.validate("", ""));
    }
}
