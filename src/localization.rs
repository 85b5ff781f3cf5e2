use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;
use unic_langid::LanguageIdentifier;

/// Catalogs compiled into the binary, keyed by language
const CATALOGS: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("fr", include_str!("../locales/fr/main.ftl")),
];

const DEFAULT_LANGUAGE: &str = "en";

/// Localization manager for the Cashout bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every bundled language
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (language, source) in CATALOGS {
            let locale: LanguageIdentifier = language.parse()?;
            let bundle = Self::create_bundle(&locale, source)?;
            bundles.insert(language.to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    fn create_bundle(
        locale: &LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Telegram renders the bidi isolation marks literally
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid {} catalog: {:?}", locale, errors))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate messages in {} catalog: {:?}", locale, errors))?;

        Ok(bundle)
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Get a localized message in a specific language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match bundle.get_message(key).and_then(|msg| msg.value()) {
            Some(pattern) => pattern,
            None => return format!("Missing translation: {}", key),
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            warn!(key = key, language = language, errors = ?errors, "Fluent formatting errors");
        }

        value.into_owned()
    }
}

static LOCALIZATION_MANAGER: LazyLock<Result<LocalizationManager, String>> =
    LazyLock::new(|| LocalizationManager::new().map_err(|e| e.to_string()));

/// Load and check the catalogs up front so a broken one fails at boot
pub fn init_localization() -> Result<()> {
    LOCALIZATION_MANAGER
        .as_ref()
        .map(|_| ())
        .map_err(|e| anyhow!("Failed to load localization catalogs: {}", e))
}

/// Map a Telegram language code such as `fr-FR` to a supported catalog
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    match language_code {
        Some(code) if code.to_lowercase().starts_with("fr") => "fr",
        _ => DEFAULT_LANGUAGE,
    }
}

/// Localized message for the user's Telegram language code
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    t_args_lang(key, &[], language_code)
}

/// Localized message with arguments for the user's Telegram language code
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    let language = detect_language(language_code);
    match LOCALIZATION_MANAGER.as_ref() {
        Ok(manager) if args.is_empty() => manager.get_message_in_language(key, language, None),
        Ok(manager) => {
            let args: HashMap<&str, &str> = args.iter().copied().collect();
            manager.get_message_in_language(key, language, Some(&args))
        }
        Err(_) => format!("Missing translation: {}", key),
    }
}
