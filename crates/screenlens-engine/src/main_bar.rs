//! Presentation logic of the floating main bar.

use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use screenlens_ipc::{
    MainBarAction, MainBarButton, MainBarState, NavState, NavStateKind, NavigationAction,
    OcrProvider, Settings, TranslationProviderType,
};

/// Keys of the main bar menu items.
pub mod menu {
    pub const SETTING: &str = "setting";
    pub const PRIVACY_POLICY: &str = "privacy_policy";
    pub const ABOUT: &str = "about";
    pub const VERSION_HISTORY: &str = "version_history";
    pub const README: &str = "readme";
    pub const HIDE: &str = "hide";
    pub const EXIT: &str = "exit";
}

/// Pages the menu links to. Menu items without a link do nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuLinks {
    pub privacy_policy: Option<Url>,
    pub about: Option<Url>,
}

/// When and how far the idle main bar fades.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeOutPolicy {
    pub enabled: bool,
    pub delay: Duration,
    pub alpha: f32,
}

impl FadeOutPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            enabled: settings.enable_fade_out_while_idle,
            delay: settings.fade_out_delay(),
            alpha: settings.fade_out_alpha,
        }
    }
}

/// Language label shown on the bar for the selected provider.
pub fn lang_text(
    provider: TranslationProviderType,
    ocr_lang: &str,
    translation_lang: &str,
) -> String {
    match provider {
        TranslationProviderType::GoogleTranslateApp
        | TranslationProviderType::BingTranslateApp
        | TranslationProviderType::OtherTranslateApp => format!("{ocr_lang}>"),
        TranslationProviderType::YandexTranslateApp => format!("{ocr_lang} > Y"),
        TranslationProviderType::PapagoTranslateApp => format!("{ocr_lang} > P"),
        TranslationProviderType::OcrOnly => format!(" {ocr_lang} "),
        TranslationProviderType::GoogleMlKit
        | TranslationProviderType::MicrosoftAzure
        | TranslationProviderType::MyMemory => format!("{ocr_lang}>{translation_lang}"),
    }
}

/// Derives [`MainBarState`] and [`MainBarAction`]s from navigation and
/// user input.
pub struct MainBarPresenter {
    state: MainBarState,
    fade: FadeOutPolicy,
    links: MenuLinks,
    ocr_provider: OcrProvider,
    ocr_lang: String,
}

impl MainBarPresenter {
    pub fn new(settings: &Settings, links: MenuLinks) -> Self {
        let mut presenter = Self {
            state: MainBarState::default(),
            fade: FadeOutPolicy::from_settings(settings),
            links,
            ocr_provider: settings.ocr_provider,
            ocr_lang: settings.ocr_lang.clone(),
        };
        presenter.update_languages(
            settings.ocr_provider,
            &settings.ocr_lang,
            settings.translation_provider,
            &settings.translation_lang,
        );
        presenter.on_nav_state(&NavState::Idle);
        presenter
    }

    pub fn state(&self) -> &MainBarState {
        &self.state
    }

    pub fn fade_out_policy(&self) -> FadeOutPolicy {
        self.fade
    }

    /// Follow a navigation change.
    pub fn on_nav_state(&mut self, nav: &NavState) -> Vec<MainBarAction> {
        let kind = nav.kind();
        self.state.draw_main_bar = matches!(
            kind,
            NavStateKind::Idle | NavStateKind::ScreenCircling | NavStateKind::ScreenCircled
        );
        self.state.display_select_button = kind == NavStateKind::Idle;
        self.state.display_translate_button = kind == NavStateKind::ScreenCircled;
        self.state.display_close_button =
            matches!(kind, NavStateKind::ScreenCircling | NavStateKind::ScreenCircled);

        vec![MainBarAction::MoveToEdgeIfEnabled]
    }

    /// Follow a language or provider change. The OCR pair is used by the
    /// translate button from now on.
    pub fn update_languages(
        &mut self,
        ocr_provider: OcrProvider,
        ocr_lang: &str,
        provider: TranslationProviderType,
        translation_lang: &str,
    ) -> Vec<MainBarAction> {
        self.ocr_provider = ocr_provider;
        self.ocr_lang = ocr_lang.to_string();
        self.state.lang_text = lang_text(provider, ocr_lang, translation_lang);
        debug!(lang_text = %self.state.lang_text, "Main bar languages updated");
        vec![MainBarAction::MoveToEdgeIfEnabled]
    }

    /// Map a button click to bar actions and the navigation it requests.
    pub fn on_button(
        &self,
        button: MainBarButton,
    ) -> (Vec<MainBarAction>, Option<NavigationAction>) {
        let navigation = match button {
            MainBarButton::LanguageBlock => {
                return (vec![MainBarAction::OpenLanguageSelectionPanel], None);
            }
            MainBarButton::Select => NavigationAction::NavigateToScreenCircling,
            MainBarButton::Translate => NavigationAction::NavigateToScreenCapturing {
                ocr_provider: self.ocr_provider,
                ocr_lang: self.ocr_lang.clone(),
            },
            MainBarButton::Close => NavigationAction::CancelScreenCircling,
        };
        (vec![MainBarAction::RescheduleFadeOut], Some(navigation))
    }

    pub fn on_attached(&self) -> Vec<MainBarAction> {
        vec![MainBarAction::RescheduleFadeOut]
    }

    pub fn open_menu(&mut self) -> Vec<MainBarAction> {
        self.state.display_menu = true;
        vec![MainBarAction::RescheduleFadeOut, MainBarAction::ShowMenu]
    }

    /// Close the menu and act on the picked item. `None` only closes it.
    pub fn on_menu_item(&mut self, key: Option<&str>) -> Vec<MainBarAction> {
        self.state.display_menu = false;
        let mut actions = vec![MainBarAction::HideMenu, MainBarAction::RescheduleFadeOut];

        let picked = match key {
            None => None,
            Some(menu::SETTING) => Some(MainBarAction::OpenSettings),
            Some(menu::PRIVACY_POLICY) => Self::browse(self.links.privacy_policy.as_ref(), menu::PRIVACY_POLICY),
            Some(menu::ABOUT) => Self::browse(self.links.about.as_ref(), menu::ABOUT),
            Some(menu::VERSION_HISTORY) => Some(MainBarAction::OpenVersionHistory),
            Some(menu::README) => Some(MainBarAction::OpenReadme),
            Some(menu::HIDE) => Some(MainBarAction::HideMainBar),
            Some(menu::EXIT) => Some(MainBarAction::ExitApp),
            Some(other) => {
                warn!(key = other, "Unknown main bar menu item");
                None
            }
        };
        actions.extend(picked);
        actions
    }

    /// Whether the bar should fade once moved. Never while circling or
    /// with the menu open.
    pub fn fade_out_after_moved(&self, nav: NavStateKind) -> bool {
        !matches!(nav, NavStateKind::ScreenCircling | NavStateKind::ScreenCircled)
            && !self.state.display_menu
            && self.fade.enabled
    }

    fn browse(link: Option<&Url>, key: &str) -> Option<MainBarAction> {
        match link {
            Some(url) => Some(MainBarAction::OpenBrowser {
                url: url.to_string(),
            }),
            None => {
                warn!(key, "No link configured for menu item");
                None
            }
        }
    }
}
