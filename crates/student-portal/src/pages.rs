//! Page names and control ids of the portal.
//!
//! The portal is versionless; these are the names the markup currently uses.

/// Every student page lives under this directory.
pub const STUDENT_AREA: &str = "lib-student/";

pub const LOGIN: &str = "/lib-student/Login.aspx";
pub const HOME: &str = "/lib-student/Default.aspx";
pub const LOGOUT: &str = "/lib-student/Logout.aspx";
pub const TIMETABLE: &str = "/lib-student/raspored.aspx";
pub const INBOX: &str = "/lib-student/PorukePrimljene.aspx";
pub const MESSAGE_DETAIL: &str = "/lib-student/PorukaDetalji.aspx";
pub const GRADES: &str = "/lib-student/Indeks.aspx";
pub const EXAMS: &str = "/lib-student/IzvPrijavljeniIspiti.aspx";
pub const DOCUMENTS: &str = "/lib-student/DocDownloadTree.aspx";
pub const DOWNLOAD: &str = "/lib-student/getFile.aspx";
pub const PAYMENTS: &str = "/lib-student/Placanja.aspx";
pub const REGULARITY: &str = "/lib-student/Redovitost.aspx";

/// `idPV` values of the shared inbox endpoint.
pub const INBOX_MESSAGES: u8 = 1;
pub const INBOX_NOTIFICATIONS: u8 = 2;

pub fn inbox(kind: u8) -> String {
    format!("{INBOX}?idPV={kind}")
}

pub fn message_detail(id: u64) -> String {
    format!("{MESSAGE_DETAIL}?id={id}")
}

pub fn folder(id: u64) -> String {
    format!("{DOCUMENTS}?id={id}")
}

pub fn download(id: u64) -> String {
    format!("{DOWNLOAD}?id={id}")
}

/// Named WebForms controls targeted by postbacks.
pub mod controls {
    pub const LOGIN_USERNAME: &str = "ctl00$ContentPlaceHolder1$txtKorisnickoIme";
    pub const LOGIN_PASSWORD: &str = "ctl00$ContentPlaceHolder1$txtLozinka";
    pub const LOGIN_BUTTON: &str = "ctl00$ContentPlaceHolder1$btnPrijava";

    pub const TIMETABLE_NEXT: &str = "ctl00$ContentPlaceHolder1$lbSljedeciTjedan";
    pub const TIMETABLE_PREVIOUS: &str = "ctl00$ContentPlaceHolder1$lbPrethodniTjedan";
    pub const TIMETABLE_DATE: &str = "ctl00$ContentPlaceHolder1$txtDatum";

    pub const EXAM_PERIOD: &str = "ctl00$ContentPlaceHolder1$ddlAkGodRok";
}

/// Selector chain for the signed-in user's name label.
pub const USER_LABEL_SELECTORS: &[&str] = &[
    "#lblKorisnik",
    "span[id$='lblKorisnik']",
    "span[id$='lblImePrezime']",
    ".korisnik-ime",
];
