//! Vocabularies and fixed markers shared by the collection and normalization stages.

/// Button/link texts that expand dynamically loaded listings (matched case-insensitively).
pub const LOAD_MORE_TERMS: &[&str] = &[
    "carregar mais",
    "ver mais",
    "mostrar mais",
    "mais eventos",
    "load more",
    "show more",
];

/// A link (or its container) must mention one of these to count as an event item.
/// Compared against accent-folded lower-case text.
pub const EVENT_KEYWORDS: &[&str] = &[
    "evento",
    "show",
    "festival",
    "festa",
    "teatro",
    "ingresso",
    "espetaculo",
    "musica",
    "concerto",
    "exposicao",
    "feira",
    "palestra",
    "workshop",
    "oficina",
    "stand up",
    "stand-up",
    "comedia",
    "danca",
    "cinema",
    "apresentacao",
    "encontro",
    "curso",
];

/// Single-segment paths on bare-slug partner hosts that are site pages, not events.
pub const BARE_SLUG_STOPWORDS: &[&str] = &[
    "",
    "login",
    "entrar",
    "cadastro",
    "cadastrar",
    "ajuda",
    "sobre",
    "termos",
    "termos-de-uso",
    "privacidade",
    "politica-de-privacidade",
    "eventos",
    "blog",
    "contato",
    "carrinho",
    "busca",
    "buscar",
    "produtores",
    "produtor",
    "app",
    "faq",
    "meus-ingressos",
    "criar-evento",
];

/// Place names used to pull a location line out of a listing card.
pub const PLACE_ANCHORS: &[&str] = &[
    "recife",
    "olinda",
    "jaboatao",
    "boa viagem",
    "marco zero",
    "recife antigo",
    "paco do frevo",
    "santa isabel",
    "classic hall",
    "caxanga",
    "centro de convencoes",
    "teatro do parque",
    "teatro luiz mendonca",
    "shopping",
    "arena",
];

/// Boilerplate page titles that never name a specific event.
pub const GENERIC_TITLES: &[&str] = &[
    "sympla - ingressos para eventos",
    "portal de servicos - evento",
];

/// Marker of the public-sector gateway whose listing links go through an intermediate page.
pub const GATEWAY_MARKER: &str = "conecta.recife.pe.gov.br";

/// Texts of outbound action links on gateway detail pages.
pub const OUTBOUND_ACTION_TERMS: &[&str] = &[
    "acessar",
    "acesse",
    "inscreva",
    "inscricao",
    "inscricoes",
    "ingresso",
    "comprar",
    "saiba mais",
    "site do evento",
    "link do evento",
];

pub const WEB_CATEGORY: &str = "Plataforma Web";
pub const GOOGLE_CATEGORY: &str = "Eventos Google";
pub const GOOGLE_ORIGIN_HOST: &str = "google_events_api";

pub const DEFAULT_LOCATION: &str = "Recife";
pub const DEFAULT_DESCRIPTION: &str = "Sem descricao disponivel.";
pub const DISPLAY_TIME_PENDING: &str = "Horario a confirmar";
pub const DATE_PENDING: &str = "Data a confirmar";
pub const DESCRIPTION_MAX_CHARS: usize = 150;

// Audit rejection reasons
pub const REASON_NO_TITLE: &str = "sem_titulo";
pub const REASON_GENERIC_TITLE: &str = "titulo_generico";
pub const REASON_DUPLICATE_STORE: &str = "duplicado_csv";
pub const REASON_DUPLICATE_BATCH: &str = "duplicado_lote";
pub const REASON_DATE_UNPARSED: &str = "data_nao_parseada";
pub const REASON_OUT_OF_RANGE: &str = "fora_intervalo";
