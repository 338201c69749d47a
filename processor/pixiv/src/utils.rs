use common::{extract_filename_from_url, guess_content_type_from_url};

const PHIXIV_URL: &str = "https://www.phixiv.net/artworks/";

/// 首页中只有登录用户才会出现的标记
const LOGIN_MARKERS: [&str; 4] = [
    "logout.php",
    "pixiv.user.loggedIn = true",
    "_gaq.push(['_setCustomVar', 1, 'login', 'yes'",
    "var dataLayer = [{ login: 'yes',",
];

/// 判断首页 HTML 是否处于登录状态
pub fn is_logged_in_page(html: &str) -> bool {
    LOGIN_MARKERS.iter().any(|marker| html.contains(marker))
}

/// 动图不做转码，改写为 phixiv 链接
pub fn ugoira_redirect(id: &str) -> String {
    format!("{}{}", PHIXIV_URL, id)
}

/// 下载文件的文件名，取自图片链接
pub fn page_file_name(url: &str) -> String {
    let content_type = guess_content_type_from_url(url).unwrap_or_else(|| "image/jpeg".into());
    extract_filename_from_url(url, &content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_markers() {
        assert!(is_logged_in_page(
            "<html><a href=\"/logout.php?return_to=%2F\">Logout</a></html>"
        ));
        assert!(is_logged_in_page("<script>var dataLayer = [{ login: 'yes', gender: ''}]</script>"));
        assert!(!is_logged_in_page("<script>var dataLayer = [{ login: 'no', }]</script>"));
    }

    #[test]
    fn test_page_file_name() {
        assert_eq!(
            page_file_name("https://i.pximg.net/img-original/img/2023/12/25/12/00/00/114514_p0.png"),
            "114514_p0.png"
        );
        assert_eq!(page_file_name("https://i.pximg.net/"), "file.jpg");
    }

    #[test]
    fn test_ugoira_redirect() {
        assert_eq!(ugoira_redirect("44298467"), "https://www.phixiv.net/artworks/44298467");
    }
}
