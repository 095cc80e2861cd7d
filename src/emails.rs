//! HTML bodies for outbound mail. The digest base document carries
//! `{{email}}` and `{{token}}` placeholders that are substituted per
//! recipient at dispatch time.

use chrono::{Datelike, NaiveDate};

use crate::models::Idea;
use crate::synthesize::IdeaDraft;

pub fn long_date(week: NaiveDate) -> String {
    format!("{} {}, {}", week.format("%B"), week.day(), week.year())
}

pub fn short_date(week: NaiveDate) -> String {
    format!("{} {}", week.format("%b"), week.day())
}

fn tag_value(idea: &Idea, key: &str, fallback: &str) -> String {
    idea.tags
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

pub fn weekly_digest(
    ideas: &[Idea],
    winner: Option<(&Idea, usize)>,
    thread_count: i32,
    week: NaiveDate,
    frontend_url: &str,
) -> String {
    let ideas_html: String = ideas
        .iter()
        .enumerate()
        .map(|(index, idea)| {
            format!(
                r#"<div style="margin-bottom: 40px; padding-bottom: 32px; border-bottom: 1px solid #e5e5e5;">
  <div style="font-size: 11px; font-weight: 600; color: #666; text-transform: uppercase; margin-bottom: 12px;">OPPORTUNITY {number}</div>
  <h3 style="font-size: 20px; font-weight: 700; margin-bottom: 8px;">{name}</h3>
  <p style="font-size: 14px; color: #666; margin-bottom: 16px;">{title}</p>
  <div style="margin-bottom: 12px;">
    <span style="display: inline-block; padding: 4px 10px; background: #f5f5f5; border: 1px solid #d4d4d4; border-radius: 3px; font-size: 11px; margin-right: 6px;">{region}</span>
    <span style="display: inline-block; padding: 4px 10px; background: #f3e8ff; border: 1px solid #d4d4d4; border-radius: 3px; font-size: 11px;">{category}</span>
  </div>
  <div style="margin: 16px 0;"><div style="font-size: 11px; font-weight: 600; color: #666; text-transform: uppercase; margin-bottom: 6px;">Problem</div><p style="font-size: 14px; line-height: 1.6; color: #333;">{problem}</p></div>
  <div style="margin: 16px 0;"><div style="font-size: 11px; font-weight: 600; color: #666; text-transform: uppercase; margin-bottom: 6px;">Solution</div><p style="font-size: 14px; line-height: 1.6; color: #333;">{solution}</p></div>
  <div style="margin: 16px 0;"><div style="font-size: 11px; font-weight: 600; color: #666; text-transform: uppercase; margin-bottom: 6px;">Target</div><p style="font-size: 14px; line-height: 1.6; color: #333;">{target}</p></div>
  <div style="margin: 16px 0;"><div style="font-size: 11px; font-weight: 600; color: #666; text-transform: uppercase; margin-bottom: 6px;">Why It Matters</div><p style="font-size: 14px; line-height: 1.6; color: #333;">{why}</p></div>
  <div style="margin-top: 20px;">
    <a href="{frontend_url}/ideas/{id}?utm_source=email" style="display: inline-block; padding: 12px 24px; background: #f59e0b; color: #000; text-decoration: none; font-weight: 700; border-radius: 4px; font-size: 14px;">PICK THIS IDEA &rarr;</a>
  </div>
</div>"#,
                number = index + 1,
                name = idea.name,
                title = idea.title,
                region = tag_value(idea, "region", "Global"),
                category = tag_value(idea, "category", "Startup"),
                problem = idea.problem,
                solution = idea.solution,
                target = idea.target_audience,
                why = idea.why_it_matters,
                frontend_url = frontend_url,
                id = idea.id,
            )
        })
        .collect();

    let winner_html = winner
        .map(|(idea, badge_count)| {
            format!(
                r#"<div style="padding: 24px; background: #fffbeb; border: 2px solid #fbbf24; border-radius: 8px; margin-bottom: 32px;">
  <div style="font-size: 11px; font-weight: 700; color: #92400e; text-transform: uppercase; margin-bottom: 12px;">&#127942; LAST WEEK'S WINNER</div>
  <h3 style="font-size: 18px; font-weight: 700; margin-bottom: 8px;">{name}</h3>
  <p style="font-size: 13px; color: #666; margin-bottom: 12px;">{title}</p>
  <p style="font-size: 13px; color: #666; font-style: italic;"><strong>{badge_count} members</strong> picked the winner and earned a badge.</p>
</div>"#,
                name = idea.name,
                title = idea.title,
                badge_count = badge_count,
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><meta name="viewport" content="width=device-width, initial-scale=1.0"><title>Weekly Ideas - {week_date}</title></head>
<body style="margin: 0; padding: 0; font-family: monospace; background: #ffffff;">
<div style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
  <h1 style="font-size: 24px; margin-bottom: 8px;">This week's opportunities</h1>
  <p style="font-size: 13px; color: #666; margin-bottom: 32px;">Distilled from {thread_count} community threads. Week of {week_date}.</p>
  {winner_html}
  {ideas_html}
  <div style="margin-top: 40px; padding-top: 24px; border-top: 1px solid #e5e5e5; font-size: 12px; color: #999;">
    <p>You are receiving this because {{{{email}}}} is on the weekly ideas list.</p>
    <p><a href="{frontend_url}/unsubscribe?email={{{{email}}}}&amp;token={{{{token}}}}" style="color: #999;">Unsubscribe</a></p>
  </div>
</div>
</body>
</html>"#,
        week_date = long_date(week),
        thread_count = thread_count,
        winner_html = winner_html,
        ideas_html = ideas_html,
        frontend_url = frontend_url,
    )
}

/// Moderation heads-up sent after a scrape run stores new drafts.
pub fn admin_report(drafts: &[IdeaDraft], week: NaiveDate) -> String {
    let preview: String = drafts
        .iter()
        .map(|draft| {
            format!(
                r#"<div style="border: 1px solid #ccc; padding: 10px; margin: 10px 0;">
  <h3 style="font-size: 16px; margin: 0 0 8px;">{name}: {title}</h3>
  <p style="font-size: 13px; margin: 4px 0;"><b>Problem:</b> {problem}</p>
  <p style="font-size: 13px; margin: 4px 0;"><b>Solution:</b> {solution}</p>
</div>"#,
                name = draft.name,
                title = draft.title.as_deref().unwrap_or(&draft.name),
                problem = draft.problem,
                solution = draft.solution,
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<body style="margin: 0; padding: 0; font-family: monospace; background: #ffffff;">
<div style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
  <h1 style="font-size: 24px;">Scrape report</h1>
  <p style="font-size: 14px; line-height: 1.6;">{count} new drafts are waiting for moderation, week of {week_date}.</p>
  {preview}
</div>
</body>
</html>"#,
        count = drafts.len(),
        week_date = long_date(week),
        preview = preview,
    )
}

pub fn welcome(name: Option<&str>) -> String {
    let greeting = match name {
        Some(name) => format!("Hey {name},"),
        None => "Hey,".to_string(),
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="margin: 0; padding: 0; font-family: monospace; background: #ffffff;">
<div style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
  <h1 style="font-size: 24px;">Welcome aboard</h1>
  <p style="font-size: 14px; line-height: 1.6;">{greeting}</p>
  <p style="font-size: 14px; line-height: 1.6;">Every Monday you'll get a handful of startup opportunities distilled from real community discussions. Create an account to vote for the one you'd bet on.</p>
</div>
</body>
</html>"#
    )
}

pub fn login_link(action_link: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="margin: 0; padding: 0; font-family: monospace; background: #ffffff;">
<div style="max-width: 600px; margin: 0 auto; padding: 40px 20px;">
  <h1 style="font-size: 24px;">Your login link</h1>
  <p style="font-size: 14px; line-height: 1.6;">Click below to sign in. The link expires after one use.</p>
  <p style="margin: 24px 0;"><a href="{action_link}" style="display: inline-block; padding: 12px 24px; background: #f59e0b; color: #000; text-decoration: none; font-weight: 700; border-radius: 4px; font-size: 14px;">SIGN IN</a></p>
  <p style="font-size: 12px; color: #999;">If you did not request this, you can ignore this email.</p>
</div>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{admin_report, long_date, short_date};
    use crate::synthesize::IdeaDraft;

    #[test]
    fn formats_week_dates() {
        let week = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
        assert_eq!(long_date(week), "June 9, 2025");
        assert_eq!(short_date(week), "Jun 9");
    }

    #[test]
    fn admin_report_previews_each_draft() {
        let drafts: Vec<IdeaDraft> = serde_json::from_str(
            r#"[{"name": "Ledgerly", "problem": "books are a mess", "solution": "automate them"}]"#,
        )
        .unwrap();
        let html = admin_report(&drafts, NaiveDate::from_ymd_opt(2025, 6, 9).unwrap());
        assert!(html.contains("Ledgerly: Ledgerly"));
        assert!(html.contains("books are a mess"));
        assert!(html.contains("June 9, 2025"));
    }
}
